//! Fact-table pipeline
//!
//! ```text
//! timesheet -> normalise -> aggregate --+
//!                                       +-> allocate -> attach quotes -> fact
//! rev rec   -> job-month revenue -------+                                 |
//!                                                     +-------------------+
//!                                                     |                   |
//!                                                 summaries              QA
//! ```
//!
//! Nothing here fails on bad data. Unparseable values fall back to a default
//! and are surfaced through the QA report or the unallocated-revenue table.

use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate_task_months, normalize_timesheet};
use crate::allocate::{allocate_revenue, job_month_revenue};
use crate::qa::QaReport;
use crate::quotes::{attach_quotes, QuoteBook};
use crate::summary::{summarize_job_months, summarize_job_tasks};
use crate::{
    FactRow, JobMonthSummary, JobTaskSummary, PipelineOptions, RawTable, UnallocatedRevenue,
};

/// Everything one pipeline run produces
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FactOutputs {
    pub fact_job_task_month: Vec<FactRow>,
    pub job_month_summary: Vec<JobMonthSummary>,
    pub job_task_summary: Vec<JobTaskSummary>,
    pub qa: QaReport,
    pub unallocated_revenue: Vec<UnallocatedRevenue>,
}

impl FactOutputs {
    /// Every output as a named table, in export order
    pub fn named_tables(&self) -> Vec<(String, RawTable)> {
        let mut tables = vec![
            (
                "fact_job_task_month".to_string(),
                RawTable::from_records(&self.fact_job_task_month),
            ),
            (
                "job_month_summary".to_string(),
                RawTable::from_records(&self.job_month_summary),
            ),
            (
                "job_task_summary".to_string(),
                RawTable::from_records(&self.job_task_summary),
            ),
        ];
        for (check, rows) in self.qa.iter() {
            tables.push((format!("qa_{check}"), RawTable::from_records(rows)));
        }
        tables.push((
            "unallocated_revenue".to_string(),
            RawTable::from_records(&self.unallocated_revenue),
        ));
        tables
    }
}

/// Build the fact table, both summaries, QA subsets and the unallocated
/// revenue report.
///
/// `revrec` and `quotes` may be absent or empty; an empty timesheet gives
/// empty outputs.
pub fn build_fact_tables(
    timesheet: &RawTable,
    revrec: Option<&RawTable>,
    quotes: Option<&RawTable>,
    options: &PipelineOptions,
) -> FactOutputs {
    let span = tracing::info_span!("build_fact_tables", allocation = %options.allocation);
    let _enter = span.enter();
    let columns = &options.columns;

    let entries = normalize_timesheet(timesheet, columns);
    let buckets = aggregate_task_months(&entries);
    tracing::debug!(lines = entries.len(), buckets = buckets.len(), "timesheet aggregated");

    let revenue = job_month_revenue(revrec, columns);
    tracing::debug!(job_months = revenue.len(), "revenue summed");

    let allocation = allocate_revenue(&buckets, &revenue, options.allocation);
    let mut fact = allocation.rows;

    let book = QuoteBook::from_table(quotes, columns);
    attach_quotes(&mut fact, &book);

    let job_month_summary = summarize_job_months(&fact);
    let job_task_summary = summarize_job_tasks(&fact, &book);
    let qa = QaReport::audit(&fact);

    tracing::info!(
        fact_rows = fact.len(),
        job_months = job_month_summary.len(),
        job_tasks = job_task_summary.len(),
        qa_flags = qa.total_flagged(),
        "fact tables built"
    );

    FactOutputs {
        fact_job_task_month: fact,
        job_month_summary,
        job_task_summary,
        qa,
        unallocated_revenue: allocation.unallocated,
    }
}
