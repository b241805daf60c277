//! Quote join
//!
//! Quotes are matched to fact rows on the exact (job, task) pair. A quote
//! without a task normalises to the empty task name and so only matches fact
//! rows whose task is also empty. It does not spread over the job's tasks.
//!
//! Several quote rows for the same pair add up (revisions are additive).

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::normalize::{clean_job_no, clean_task_name};
use crate::{ColumnMap, FactRow, RawTable};

/// Summed quote figures for one (job, task)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteTotals {
    /// `None` only when no matching row had a numeric value
    pub quoted_hours: Option<f64>,
    pub quoted_rate: Option<f64>,
    pub latest_quote_date: Option<NaiveDate>,
    /// Number of quote rows folded into the totals
    pub quote_rows: usize,
}

pub(crate) fn add_opt(total: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (total, value) {
        (Some(t), Some(v)) => Some(t + v),
        (t, v) => t.or(v),
    }
}

impl QuoteTotals {
    fn add(&mut self, hours: Option<f64>, rate: Option<f64>, date: Option<NaiveDate>) {
        self.quoted_hours = add_opt(self.quoted_hours, hours);
        self.quoted_rate = add_opt(self.quoted_rate, rate);
        self.latest_quote_date = self.latest_quote_date.max(date);
        self.quote_rows += 1;
    }
}

/// Quote totals indexed by job, then task
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuoteBook {
    by_job: HashMap<String, HashMap<String, QuoteTotals>>,
}

impl QuoteBook {
    /// Build the book from a raw quotes table.
    ///
    /// An absent table, or one without a task column, is fine: the latter
    /// makes every quote job-level.
    pub fn from_table(quotes: Option<&RawTable>, columns: &ColumnMap) -> Self {
        let mut book = Self::default();
        let Some(table) = quotes else {
            return book;
        };

        let job_col = table.column_index(&columns.q_job_no);
        let task_col = table.column_index(&columns.q_task);
        let hours_col = table.column_index(&columns.q_quoted_hours);
        let rate_col = table.column_index(&columns.q_quoted_rate);
        let date_col = table.column_index(&columns.q_quote_date);

        for row in 0..table.len() {
            book.by_job
                .entry(clean_job_no(table.cell(row, job_col)))
                .or_default()
                .entry(clean_task_name(table.cell(row, task_col)))
                .or_default()
                .add(
                    table.cell(row, hours_col).as_number(),
                    table.cell(row, rate_col).as_number(),
                    table.cell(row, date_col).as_date(),
                );
        }

        tracing::debug!(
            rows = table.len(),
            pairs = book.len(),
            "quote totals built"
        );
        book
    }

    /// Totals for an exact (job, task) match
    pub fn get(&self, job_no: &str, task_name: &str) -> Option<&QuoteTotals> {
        self.by_job.get(job_no).and_then(|tasks| tasks.get(task_name))
    }

    /// Number of distinct (job, task) pairs
    pub fn len(&self) -> usize {
        self.by_job.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copy quoted hours and rate onto every fact row of the matching job-task.
///
/// Every month row of a job-task carries the full job-task quote; summaries
/// must not add these up again.
pub fn attach_quotes(rows: &mut [FactRow], book: &QuoteBook) {
    let mut matched = 0usize;
    for row in rows.iter_mut() {
        let totals = book.get(&row.job_no, &row.task_name);
        row.quoted_hours = totals.and_then(|q| q.quoted_hours);
        row.quoted_rate = totals.and_then(|q| q.quoted_rate);
        if totals.is_some() {
            matched += 1;
        }
    }
    tracing::debug!(rows = rows.len(), matched, "quotes attached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, FactKey};
    use pretty_assertions::assert_eq;

    fn quotes() -> RawTable {
        RawTable::new([
            "[Job] Job No.",
            "[Job Task] Name",
            "Quoted Hours",
            "Quoted Rate",
            "Quote Date",
        ])
        .with_row(vec![
            Cell::from("100"),
            Cell::from("Design"),
            Cell::from(8.0),
            Cell::from(120.0),
            Cell::from("2024-01-10"),
        ])
        .with_row(vec![
            Cell::from(100.0),
            Cell::from("Design "),
            Cell::from(2.0),
            Cell::Empty,
            Cell::from("2024-02-01"),
        ])
        .with_row(vec![
            Cell::from("100"),
            Cell::Empty,
            Cell::from(40.0),
            Cell::from(100.0),
            Cell::Empty,
        ])
    }

    fn fact_row(job: &str, task: &str) -> FactRow {
        let key = FactKey::new(job, task, NaiveDate::from_ymd_opt(2024, 3, 1));
        FactRow {
            job_no: key.job_no,
            task_name: key.task_name,
            month_key: key.month_key,
            total_hours: 10.0,
            total_cost: 500.0,
            implied_billable: 0.0,
            avg_bill_rate: None,
            avg_base_rate: Some(50.0),
            avg_logged_quoted_rate: None,
            job_month_rev: 0.0,
            rev_allocated: 0.0,
            gross_margin: -500.0,
            gm_pct: None,
            quoted_hours: None,
            quoted_rate: None,
        }
    }

    #[test]
    fn revisions_add_up() {
        let book = QuoteBook::from_table(Some(&quotes()), &ColumnMap::default());
        let design = book.get("100", "Design").unwrap();

        assert_eq!(design.quoted_hours, Some(10.0));
        assert_eq!(design.quoted_rate, Some(120.0));
        assert_eq!(design.latest_quote_date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(design.quote_rows, 2);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn job_level_quote_only_matches_empty_task() {
        let book = QuoteBook::from_table(Some(&quotes()), &ColumnMap::default());
        let mut rows = vec![fact_row("100", "Build"), fact_row("100", "")];
        attach_quotes(&mut rows, &book);

        assert_eq!(rows[0].quoted_hours, None);
        assert_eq!(rows[1].quoted_hours, Some(40.0));
        assert_eq!(rows[1].quoted_rate, Some(100.0));
    }

    #[test]
    fn missing_task_column_makes_all_quotes_job_level() {
        let table = RawTable::new(["[Job] Job No.", "Quoted Hours"])
            .with_row(vec![Cell::from("7"), Cell::from(3.0)])
            .with_row(vec![Cell::from("7"), Cell::from(4.0)]);
        let book = QuoteBook::from_table(Some(&table), &ColumnMap::default());

        assert_eq!(book.get("7", "").and_then(|q| q.quoted_hours), Some(7.0));
        assert!(book.get("7", "Design").is_none());
    }

    #[test]
    fn no_quotes_leaves_rows_unquoted() {
        let book = QuoteBook::from_table(None, &ColumnMap::default());
        assert!(book.is_empty());

        let mut rows = vec![fact_row("100", "Design")];
        attach_quotes(&mut rows, &book);
        assert_eq!(rows[0].quoted_hours, None);
        assert_eq!(rows[0].quoted_rate, None);
    }

    #[test]
    fn non_numeric_quote_hours_stay_null() {
        let table = RawTable::new(["[Job] Job No.", "[Job Task] Name", "Quoted Hours"])
            .with_row(vec![Cell::from("1"), Cell::from("A"), Cell::from("tbc")]);
        let book = QuoteBook::from_table(Some(&table), &ColumnMap::default());

        let totals = book.get("1", "A").unwrap();
        assert_eq!(totals.quoted_hours, None);
        assert_eq!(totals.quote_rows, 1);
    }
}
