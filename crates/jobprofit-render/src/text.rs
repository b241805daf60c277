//! Plain-text tables and reports for console output

use jobprofit_core::metrics::Kpis;
use jobprofit_core::{Cell, FactOutputs, RawTable, RenderError, Renderer, Tabular};

/// Group digits in thousands with two decimals: `-1,234.50`
pub fn format_money(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

/// A ratio as a percentage with one decimal; `-` when undefined
pub fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

/// Display text of one cell
pub fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Number(n) if n.is_nan() => String::new(),
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{n:.0}"),
        Cell::Number(n) => format!("{n:.2}"),
        Cell::Text(s) => s.clone(),
        Cell::Bool(b) => b.to_string(),
        Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
    }
}

/// Column-aligned text table renderer
#[derive(Clone, Debug)]
pub struct TextRenderer {
    /// Rows shown per table before truncating
    pub max_rows: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { max_rows: 50 }
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row limit per table
    pub fn max_rows(mut self, rows: usize) -> Self {
        self.max_rows = rows;
        self
    }

    /// Lay out a table with padded columns; numbers align right
    pub fn table(&self, table: &RawTable) -> String {
        let shown = table.len().min(self.max_rows);
        let rows: Vec<Vec<String>> = table.rows()[..shown]
            .iter()
            .map(|row| {
                (0..table.columns().len())
                    .map(|c| row.get(c).map(format_cell).unwrap_or_default())
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .map(|(c, header)| {
                rows.iter()
                    .map(|r| r[c].chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let numeric: Vec<bool> = (0..table.columns().len())
            .map(|c| {
                table.rows()[..shown]
                    .iter()
                    .any(|r| matches!(r.get(c), Some(Cell::Number(_))))
            })
            .collect();

        let mut out = String::new();
        let header: Vec<String> = table
            .columns()
            .iter()
            .zip(&widths)
            .map(|(h, &w)| format!("{h:<w$}"))
            .collect();
        out.push_str(&format!("{}\n", header.join("  ").trim_end()));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&format!("{}\n", rule.join("  ")));

        for row in &rows {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .zip(&numeric)
                .map(|((value, &w), &is_num)| {
                    if is_num {
                        format!("{value:>w$}")
                    } else {
                        format!("{value:<w$}")
                    }
                })
                .collect();
            out.push_str(&format!("{}\n", line.join("  ").trim_end()));
        }

        if table.len() > shown {
            out.push_str(&format!("... {} more rows\n", table.len() - shown));
        }
        out
    }

    /// Lay out typed records
    pub fn records<T: Tabular>(&self, records: &[T]) -> String {
        self.table(&RawTable::from_records(records))
    }

    /// Headline KPI block
    pub fn kpis(&self, kpis: &Kpis) -> String {
        let mut out = String::new();
        out.push_str(&format!("Revenue:       {:>16}\n", format_money(kpis.revenue)));
        out.push_str(&format!("Cost:          {:>16}\n", format_money(kpis.cost)));
        out.push_str(&format!("Gross margin:  {:>16}\n", format_money(kpis.gross_margin)));
        out.push_str(&format!("GM %:          {:>16}\n", format_pct(kpis.gm_pct)));
        out
    }
}

/// Bundle overview: KPIs, table sizes, QA counts and unallocated revenue
impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, outputs: &FactOutputs) -> Result<String, RenderError> {
        let mut out = String::new();
        out.push_str(&self.kpis(&Kpis::from_job_months(&outputs.job_month_summary)));
        out.push('\n');

        out.push_str(&format!("Fact rows:      {}\n", outputs.fact_job_task_month.len()));
        out.push_str(&format!("Job-months:     {}\n", outputs.job_month_summary.len()));
        out.push_str(&format!("Job-tasks:      {}\n", outputs.job_task_summary.len()));
        out.push('\n');

        out.push_str("Data QA\n");
        for (check, rows) in outputs.qa.iter() {
            out.push_str(&format!("  {:<22} {:>6}\n", check.as_str(), rows.len()));
        }

        if !outputs.unallocated_revenue.is_empty() {
            let total: f64 = outputs.unallocated_revenue.iter().map(|u| u.job_month_rev).sum();
            out.push_str(&format!(
                "\nUnallocated revenue: {} across {} job-months\n",
                format_money(total),
                outputs.unallocated_revenue.len()
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(1234.5), "1,234.50");
        assert_eq!(format_money(-1_500_000.0), "-1,500,000.00");
        assert_eq!(format_money(999.999), "1,000.00");
        assert_eq!(format_money(-0.001), "0.00");
    }

    #[test]
    fn pct_formatting() {
        assert_eq!(format_pct(Some(0.75)), "75.0%");
        assert_eq!(format_pct(Some(-0.125)), "-12.5%");
        assert_eq!(format_pct(None), "-");
    }

    #[test]
    fn cells_render_compactly() {
        assert_eq!(format_cell(&Cell::from(10.0)), "10");
        assert_eq!(format_cell(&Cell::from(0.25)), "0.25");
        assert_eq!(format_cell(&Cell::Empty), "");
        assert_eq!(
            format_cell(&Cell::from(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())),
            "2024-03-01"
        );
    }

    #[test]
    fn table_aligns_columns() {
        let table = RawTable::new(["job", "hours"])
            .with_row(vec![Cell::from("100"), Cell::from(10.0)])
            .with_row(vec![Cell::from("2"), Cell::from(2.5)]);
        let text = TextRenderer::new().table(&table);

        assert_eq!(text, "job  hours\n---  -----\n100     10\n2     2.50\n");
    }

    #[test]
    fn kpi_block_lines() {
        let kpis = Kpis {
            revenue: 1500.0,
            cost: 500.0,
            gross_margin: 1000.0,
            gm_pct: Some(2.0 / 3.0),
        };
        let text = TextRenderer::new().kpis(&kpis);
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "Revenue:               1,500.00",
                "Cost:                    500.00",
                "Gross margin:          1,000.00",
                "GM %:                     66.7%",
            ]
        );
    }

    #[test]
    fn long_tables_are_truncated() {
        let mut table = RawTable::new(["n"]);
        for i in 0..5 {
            table.push_row(vec![Cell::from(i as f64)]);
        }
        let text = TextRenderer::new().max_rows(2).table(&table);
        assert!(text.ends_with("... 3 more rows\n"));
        assert_eq!(text.lines().count(), 5);
    }
}
