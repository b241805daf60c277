//! Summary views over the fact table

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::quotes::{add_opt, QuoteBook};
use crate::{cmp_month_keys, gm_pct, FactRow, JobMonthSummary, JobTaskSummary};

#[derive(Default)]
struct Totals {
    hours: f64,
    cost: f64,
    rev: f64,
    gm: f64,
    quoted_hours: Option<f64>,
}

impl Totals {
    fn add(&mut self, row: &FactRow) {
        self.hours += row.total_hours;
        self.cost += row.total_cost;
        self.rev += row.rev_allocated;
        self.gm += row.gross_margin;
        self.quoted_hours = add_opt(self.quoted_hours, row.quoted_hours);
    }
}

/// Roll the fact table up to (job, task).
///
/// Quoted hours are summed over the fact rows like every other measure, so a
/// quote attached to each month of a multi-month task counts once per month.
/// The sum is `None` when no row carries a quote. A task is unquoted when
/// that sum is missing or exactly zero; only after that test is a missing
/// quote read as 0 for the variance. The quote book supplies the latest
/// quote date.
pub fn summarize_job_tasks(fact: &[FactRow], quotes: &QuoteBook) -> Vec<JobTaskSummary> {
    let mut groups: BTreeMap<(&str, &str), Totals> = BTreeMap::new();
    for row in fact {
        groups
            .entry((row.job_no.as_str(), row.task_name.as_str()))
            .or_default()
            .add(row);
    }

    groups
        .into_iter()
        .map(|((job_no, task_name), totals)| {
            let quoted_hours = totals.quoted_hours;
            let is_unquoted_task = quoted_hours.map_or(true, |q| q == 0.0);

            JobTaskSummary {
                job_no: job_no.to_string(),
                task_name: task_name.to_string(),
                actual_hours: totals.hours,
                actual_cost: totals.cost,
                actual_rev: totals.rev,
                gross_margin: totals.gm,
                gm_pct: gm_pct(totals.gm, totals.rev),
                quoted_hours,
                hour_variance: totals.hours - quoted_hours.unwrap_or(0.0),
                is_unquoted_task,
                latest_quote_date: quotes
                    .get(job_no, task_name)
                    .and_then(|q| q.latest_quote_date),
            }
        })
        .collect()
}

/// Roll the fact table up to (job, month), ordered by job then month.
pub fn summarize_job_months(fact: &[FactRow]) -> Vec<JobMonthSummary> {
    let mut groups: HashMap<(&str, Option<NaiveDate>), Totals> = HashMap::new();
    for row in fact {
        groups
            .entry((row.job_no.as_str(), row.month_key))
            .or_default()
            .add(row);
    }

    let mut summary: Vec<JobMonthSummary> = groups
        .into_iter()
        .map(|((job_no, month_key), totals)| JobMonthSummary {
            job_no: job_no.to_string(),
            month_key,
            rev: totals.rev,
            cost: totals.cost,
            hours: totals.hours,
            gm: totals.gm,
            gm_pct: gm_pct(totals.gm, totals.rev),
        })
        .collect();
    summary.sort_by(|a, b| {
        a.job_no
            .cmp(&b.job_no)
            .then_with(|| cmp_month_keys(a.month_key, b.month_key))
    });
    summary
}
