//! Subcommand implementations

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use jobprofit_core::metrics::{
    job_drilldown, job_numbers, margin_trend, overrun_tasks, quote_accuracy, top_loss_jobs,
    unquoted_work, Kpis, QuotePoint, TaskOverrun, TrendPoint,
};
use jobprofit_core::{
    clean_job_no, AllocationMode, Cell, FactRow, JobMonthSummary, JobTaskSummary, PipelineCache,
    QaCheck, Renderer, Tabular, UnallocatedRevenue,
};
use jobprofit_loader::{load_workbook, SheetRole};
use jobprofit_render::{format_money, ExcelExporter, JsonRenderer, TextRenderer};
use serde::Serialize;

use crate::session::{Session, Settings};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", JsonRenderer::new().pretty().to_json(value)?);
    Ok(())
}

fn heading(out: &mut String, title: &str) {
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.chars().count()));
    out.push('\n');
}

// ============================================================================
// sheets
// ============================================================================

pub fn sheets(file: &Path, settings: &Settings) -> Result<()> {
    let workbook = load_workbook(file)?;
    if settings.is_json() {
        return print_json(&workbook.meta);
    }

    let mut out = String::new();
    for role in SheetRole::ALL {
        let sheet = workbook.meta.sheet_for(role).unwrap_or("(not found)");
        writeln!(out, "{:<10} {sheet}", role.as_str())?;
    }
    writeln!(out, "\nSheets: {}", workbook.meta.sheets.join(", "))?;
    print!("{out}");
    Ok(())
}

// ============================================================================
// report
// ============================================================================

#[derive(Serialize)]
struct Report {
    allocation: AllocationMode,
    kpis: Kpis,
    margin_trend: Vec<TrendPoint>,
    top_loss_jobs: Vec<JobMonthSummary>,
}

pub fn report(file: &Path, n: usize, settings: &Settings) -> Result<()> {
    let session = Session::open(file, settings)?;
    let outputs = session.build()?;
    let report = Report {
        allocation: session.options.allocation,
        kpis: Kpis::from_job_months(&outputs.job_month_summary),
        margin_trend: margin_trend(&outputs.job_month_summary),
        top_loss_jobs: top_loss_jobs(&outputs.job_month_summary, n),
    };
    if settings.is_json() {
        return print_json(&report);
    }

    let text = TextRenderer::new();
    let mut out = String::new();
    heading(&mut out, "Overview");
    writeln!(out, "Allocation:    {:>16}", report.allocation.as_str())?;
    out.push_str(&text.kpis(&report.kpis));

    out.push('\n');
    heading(&mut out, "Margin trend");
    out.push_str(&text.records(&report.margin_trend));

    out.push('\n');
    heading(&mut out, &format!("Top {n} loss-making job-months"));
    out.push_str(&text.records(&report.top_loss_jobs));
    print!("{out}");
    Ok(())
}

// ============================================================================
// job
// ============================================================================

pub fn job(file: &Path, job_no: &str, settings: &Settings) -> Result<()> {
    let session = Session::open(file, settings)?;
    let outputs = session.build()?;

    let wanted = clean_job_no(job_no);
    let Some(drill) = job_drilldown(&outputs.fact_job_task_month, &wanted) else {
        let known = job_numbers(&outputs.fact_job_task_month);
        bail!(
            "Job '{wanted}' not found ({} jobs in the workbook)",
            known.len()
        );
    };
    if settings.is_json() {
        return print_json(&drill);
    }

    let text = TextRenderer::new();
    let mut out = String::new();
    heading(&mut out, &format!("Job {}", drill.job_no));
    out.push_str(&text.kpis(&drill.kpis));

    out.push('\n');
    heading(&mut out, "Task mix");
    out.push_str(&text.records(&drill.task_mix));

    out.push('\n');
    heading(&mut out, "Monthly");
    out.push_str(&text.records(&drill.monthly));

    out.push('\n');
    heading(&mut out, "Fact rows");
    out.push_str(&text.records(&drill.rows));
    print!("{out}");
    Ok(())
}

// ============================================================================
// quotes
// ============================================================================

#[derive(Serialize)]
struct QuoteReport {
    overruns: Vec<TaskOverrun>,
    unquoted: Vec<JobTaskSummary>,
    accuracy: Vec<QuotePoint>,
}

pub fn quotes(file: &Path, min_quoted_hours: f64, n: usize, settings: &Settings) -> Result<()> {
    let session = Session::open(file, settings)?;
    let outputs = session.build()?;
    let report = QuoteReport {
        overruns: overrun_tasks(&outputs.job_task_summary, min_quoted_hours, n),
        unquoted: unquoted_work(&outputs.job_task_summary, n),
        accuracy: quote_accuracy(&outputs.job_task_summary),
    };
    if settings.is_json() {
        return print_json(&report);
    }

    let text = TextRenderer::new();
    let mut out = String::new();
    heading(&mut out, "Largest overruns");
    out.push_str(&text.records(&report.overruns));

    out.push('\n');
    heading(&mut out, "Largest unquoted work");
    out.push_str(&text.records(&report.unquoted));

    out.push('\n');
    heading(&mut out, "Quote accuracy");
    out.push_str(&text.records(&report.accuracy));
    print!("{out}");
    Ok(())
}

// ============================================================================
// qa
// ============================================================================

#[derive(Serialize)]
struct CheckResult<'a> {
    check: QaCheck,
    description: &'static str,
    count: usize,
    rows: &'a [FactRow],
}

#[derive(Serialize)]
struct QaSummary<'a> {
    checks: Vec<CheckResult<'a>>,
    unallocated_revenue: &'a [UnallocatedRevenue],
}

pub fn qa(file: &Path, limit: usize, settings: &Settings) -> Result<()> {
    let session = Session::open(file, settings)?;
    let outputs = session.build()?;

    if settings.is_json() {
        let checks = outputs
            .qa
            .iter()
            .map(|(check, rows)| CheckResult {
                check,
                description: check.description(),
                count: rows.len(),
                rows: &rows[..rows.len().min(limit)],
            })
            .collect();
        return print_json(&QaSummary {
            checks,
            unallocated_revenue: &outputs.unallocated_revenue,
        });
    }

    let text = TextRenderer::new().max_rows(limit);
    let mut out = String::new();
    for (check, rows) in outputs.qa.iter() {
        heading(&mut out, check.as_str());
        writeln!(out, "{}", check.description())?;
        if rows.is_empty() {
            writeln!(out, "No issues found.")?;
        } else {
            writeln!(out, "{} rows flagged", rows.len())?;
            out.push_str(&text.records(rows));
        }
        out.push('\n');
    }

    heading(&mut out, "unallocated_revenue");
    if outputs.unallocated_revenue.is_empty() {
        writeln!(out, "All revenue allocated.")?;
    } else {
        let total: f64 = outputs.unallocated_revenue.iter().map(|u| u.job_month_rev).sum();
        writeln!(out, "{} unallocated", format_money(total))?;
        out.push_str(&text.records(&outputs.unallocated_revenue));
    }
    print!("{out}");
    Ok(())
}

// ============================================================================
// export
// ============================================================================

pub fn export(file: &Path, output: &Path, settings: &Settings) -> Result<()> {
    let session = Session::open(file, settings)?;
    let outputs = session.build()?;

    let bytes = if settings.is_json() {
        JsonRenderer::new().pretty().render(&outputs)?.into_bytes()
    } else {
        ExcelExporter::new().render(&outputs)?
    };
    std::fs::write(output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!(path = %output.display(), bytes = bytes.len(), "export written");
    eprintln!("Wrote {}", output.display());
    Ok(())
}

// ============================================================================
// compare
// ============================================================================

/// One job-task's revenue under both allocation weights
#[derive(Clone, Debug, PartialEq, Serialize)]
struct RevenueComparison {
    job_no: String,
    task_name: String,
    rev_by_hours: f64,
    rev_by_cost: f64,
    difference: f64,
}

impl Tabular for RevenueComparison {
    fn headers() -> &'static [&'static str] {
        &["job_no", "task_name", "rev_by_hours", "rev_by_cost", "difference"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.job_no.as_str()),
            Cell::from(self.task_name.as_str()),
            Cell::from(self.rev_by_hours),
            Cell::from(self.rev_by_cost),
            Cell::from(self.difference),
        ]
    }
}

/// Pair job-task revenue from two runs.
///
/// Allocation never changes the fact keys, so both summaries list the same
/// job-tasks in the same order.
fn compare_revenue(by_hours: &[JobTaskSummary], by_cost: &[JobTaskSummary]) -> Vec<RevenueComparison> {
    let mut rows: Vec<RevenueComparison> = by_hours
        .iter()
        .zip(by_cost)
        .map(|(h, c)| RevenueComparison {
            job_no: h.job_no.clone(),
            task_name: h.task_name.clone(),
            rev_by_hours: h.actual_rev,
            rev_by_cost: c.actual_rev,
            difference: c.actual_rev - h.actual_rev,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.difference
            .abs()
            .total_cmp(&a.difference.abs())
            .then_with(|| a.job_no.cmp(&b.job_no))
            .then_with(|| a.task_name.cmp(&b.task_name))
    });
    rows
}

pub fn compare(file: &Path, n: usize, settings: &Settings) -> Result<()> {
    let session = Session::open(file, settings)?;
    let timesheet = session.workbook.require_timesheet()?;
    let revrec = session.workbook.revrec.as_ref();
    let quotes = session.workbook.quotes.as_ref();

    let mut cache = PipelineCache::default();
    let hours_options = session.options.clone().allocation(AllocationMode::Hours);
    let cost_options = session.options.clone().allocation(AllocationMode::Cost);
    let by_hours = cache.get_or_build(timesheet, revrec, quotes, &hours_options);
    let by_cost = cache.get_or_build(timesheet, revrec, quotes, &cost_options);
    tracing::debug!(hits = cache.hits(), misses = cache.misses(), "allocation runs cached");

    let mut rows = compare_revenue(&by_hours.job_task_summary, &by_cost.job_task_summary);
    rows.truncate(n);
    if settings.is_json() {
        return print_json(&rows);
    }

    let mut out = String::new();
    heading(&mut out, "Revenue by allocation weight");
    writeln!(
        out,
        "Hours: {}  Cost: {}",
        format_money(Kpis::from_job_months(&by_hours.job_month_summary).revenue),
        format_money(Kpis::from_job_months(&by_cost.job_month_summary).revenue),
    )?;
    out.push('\n');
    out.push_str(&TextRenderer::new().records(&rows));
    print!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(job: &str, task: &str, rev: f64) -> JobTaskSummary {
        JobTaskSummary {
            job_no: job.to_string(),
            task_name: task.to_string(),
            actual_hours: 1.0,
            actual_cost: 0.0,
            actual_rev: rev,
            gross_margin: rev,
            gm_pct: Some(1.0),
            quoted_hours: None,
            hour_variance: 1.0,
            is_unquoted_task: true,
            latest_quote_date: None,
        }
    }

    #[test]
    fn comparison_orders_by_absolute_difference() {
        let hours = vec![summary("1", "A", 100.0), summary("1", "B", 50.0), summary("2", "C", 10.0)];
        let cost = vec![summary("1", "A", 80.0), summary("1", "B", 70.0), summary("2", "C", 40.0)];

        let rows = compare_revenue(&hours, &cost);
        let order: Vec<(&str, f64)> = rows.iter().map(|r| (r.task_name.as_str(), r.difference)).collect();
        assert_eq!(order, vec![("C", 30.0), ("A", -20.0), ("B", 20.0)]);
    }
}
