//! Reporting helpers over the summaries
//!
//! Small, pure views used by the report screens: worst jobs, quote overruns,
//! unquoted work, headline KPIs and trends.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{cmp_month_keys, gm_pct, Cell, FactRow, JobMonthSummary, JobTaskSummary, Tabular};

/// Number of tasks shown in a job's task mix
pub const TASK_MIX_LIMIT: usize = 30;

/// Descending order for optional values, with `None` last
fn cmp_desc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The `n` job-months with the lowest gross margin, most negative first
pub fn top_loss_jobs(job_month: &[JobMonthSummary], n: usize) -> Vec<JobMonthSummary> {
    let mut rows = job_month.to_vec();
    rows.sort_by(|a, b| a.gm.total_cmp(&b.gm));
    rows.truncate(n);
    rows
}

/// A job-task with its hour overrun relative to the quote
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskOverrun {
    #[serde(flatten)]
    pub summary: JobTaskSummary,
    /// hour_variance / quoted_hours; `None` when quoted hours are 0
    pub overrun_pct: Option<f64>,
}

impl Tabular for TaskOverrun {
    fn headers() -> &'static [&'static str] {
        &[
            "job_no",
            "task_name",
            "actual_hours",
            "quoted_hours",
            "hour_variance",
            "overrun_pct",
            "gross_margin",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.summary.job_no.as_str()),
            Cell::from(self.summary.task_name.as_str()),
            Cell::from(self.summary.actual_hours),
            Cell::from(self.summary.quoted_hours),
            Cell::from(self.summary.hour_variance),
            Cell::from(self.overrun_pct),
            Cell::from(self.summary.gross_margin),
        ]
    }
}

/// Tasks quoted at `min_quoted_hours` or more, largest overrun first.
///
/// A missing quote counts as 0 hours for the threshold.
pub fn overrun_tasks(job_task: &[JobTaskSummary], min_quoted_hours: f64, n: usize) -> Vec<TaskOverrun> {
    let mut rows: Vec<TaskOverrun> = job_task
        .iter()
        .filter(|t| t.quoted_hours.unwrap_or(0.0) >= min_quoted_hours)
        .map(|t| {
            let quoted = t.quoted_hours.unwrap_or(0.0);
            TaskOverrun {
                summary: t.clone(),
                overrun_pct: (quoted != 0.0).then(|| t.hour_variance / quoted),
            }
        })
        .collect();
    rows.sort_by(|a, b| cmp_desc_nulls_last(a.overrun_pct, b.overrun_pct));
    rows.truncate(n);
    rows
}

/// Unquoted tasks, most hours first
pub fn unquoted_work(job_task: &[JobTaskSummary], n: usize) -> Vec<JobTaskSummary> {
    let mut rows: Vec<JobTaskSummary> = job_task.iter().filter(|t| t.is_unquoted_task).cloned().collect();
    rows.sort_by(|a, b| b.actual_hours.total_cmp(&a.actual_hours));
    rows.truncate(n);
    rows
}

// ============================================================================
// KPIs and trends
// ============================================================================

/// Headline totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub revenue: f64,
    pub cost: f64,
    pub gross_margin: f64,
    pub gm_pct: Option<f64>,
}

impl Kpis {
    fn from_totals(revenue: f64, cost: f64, gross_margin: f64) -> Self {
        Self {
            revenue,
            cost,
            gross_margin,
            gm_pct: gm_pct(gross_margin, revenue),
        }
    }

    pub fn from_job_months(job_month: &[JobMonthSummary]) -> Self {
        let (rev, cost, gm) = job_month
            .iter()
            .fold((0.0, 0.0, 0.0), |(r, c, g), s| (r + s.rev, c + s.cost, g + s.gm));
        Self::from_totals(rev, cost, gm)
    }

    pub fn from_fact(fact: &[FactRow]) -> Self {
        let (rev, cost, gm) = fact.iter().fold((0.0, 0.0, 0.0), |(r, c, g), row| {
            (r + row.rev_allocated, c + row.total_cost, g + row.gross_margin)
        });
        Self::from_totals(rev, cost, gm)
    }
}

/// One month of a revenue / margin trend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// `None` for the bucket of rows without a month
    pub month_key: Option<NaiveDate>,
    pub rev: f64,
    pub cost: f64,
    pub gm: f64,
}

impl Tabular for TrendPoint {
    fn headers() -> &'static [&'static str] {
        &["month_key", "rev", "cost", "gm"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.month_key),
            Cell::from(self.rev),
            Cell::from(self.cost),
            Cell::from(self.gm),
        ]
    }
}

fn trend(points: impl Iterator<Item = (Option<NaiveDate>, f64, f64, f64)>) -> Vec<TrendPoint> {
    let mut by_month: BTreeMap<NaiveDate, (f64, f64, f64)> = BTreeMap::new();
    let mut undated: Option<(f64, f64, f64)> = None;
    for (month, rev, cost, gm) in points {
        let entry = match month {
            Some(month) => by_month.entry(month).or_default(),
            None => undated.get_or_insert_with(Default::default),
        };
        entry.0 += rev;
        entry.1 += cost;
        entry.2 += gm;
    }
    by_month
        .into_iter()
        .map(|(month, totals)| (Some(month), totals))
        .chain(undated.map(|totals| (None, totals)))
        .map(|(month_key, (rev, cost, gm))| TrendPoint {
            month_key,
            rev,
            cost,
            gm,
        })
        .collect()
}

/// Revenue, cost and margin per month across all jobs, oldest first.
/// Rows without a month are summed into one trailing point.
pub fn margin_trend(job_month: &[JobMonthSummary]) -> Vec<TrendPoint> {
    trend(job_month.iter().map(|s| (s.month_key, s.rev, s.cost, s.gm)))
}

/// Sorted distinct job numbers, blanks excluded
pub fn job_numbers(fact: &[FactRow]) -> Vec<String> {
    fact.iter()
        .filter(|r| !r.job_no.is_empty())
        .map(|r| r.job_no.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Job drilldown
// ============================================================================

/// Hours and margin for one task of a job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskMix {
    pub task_name: String,
    pub hours: f64,
    pub gm: f64,
}

impl Tabular for TaskMix {
    fn headers() -> &'static [&'static str] {
        &["task_name", "hours", "gm"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.task_name.as_str()),
            Cell::from(self.hours),
            Cell::from(self.gm),
        ]
    }
}

/// Everything the single-job screen shows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobDrilldown {
    pub job_no: String,
    pub kpis: Kpis,
    /// Tasks by hours, largest first, at most [`TASK_MIX_LIMIT`]
    pub task_mix: Vec<TaskMix>,
    pub monthly: Vec<TrendPoint>,
    /// The job's fact rows, by month then task
    pub rows: Vec<FactRow>,
}

/// Drill into one job; `None` when the job has no fact rows
pub fn job_drilldown(fact: &[FactRow], job_no: &str) -> Option<JobDrilldown> {
    let mut rows: Vec<FactRow> = fact.iter().filter(|r| r.job_no == job_no).cloned().collect();
    if rows.is_empty() {
        return None;
    }
    rows.sort_by(|a, b| {
        cmp_month_keys(a.month_key, b.month_key).then_with(|| a.task_name.cmp(&b.task_name))
    });

    let mut by_task: HashMap<&str, (f64, f64)> = HashMap::new();
    for row in &rows {
        let entry = by_task.entry(row.task_name.as_str()).or_default();
        entry.0 += row.total_hours;
        entry.1 += row.gross_margin;
    }
    let mut task_mix: Vec<TaskMix> = by_task
        .into_iter()
        .map(|(task, (hours, gm))| TaskMix {
            task_name: task.to_string(),
            hours,
            gm,
        })
        .collect();
    task_mix.sort_by(|a, b| {
        b.hours
            .total_cmp(&a.hours)
            .then_with(|| a.task_name.cmp(&b.task_name))
    });
    task_mix.truncate(TASK_MIX_LIMIT);

    let monthly = trend(
        rows.iter()
            .map(|r| (r.month_key, r.rev_allocated, r.total_cost, r.gross_margin)),
    );

    Some(JobDrilldown {
        job_no: job_no.to_string(),
        kpis: Kpis::from_fact(&rows),
        task_mix,
        monthly,
        rows,
    })
}

/// A quoted task's quote against what was actually logged
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotePoint {
    pub job_no: String,
    pub task_name: String,
    pub quoted_hours: f64,
    pub actual_hours: f64,
}

impl Tabular for QuotePoint {
    fn headers() -> &'static [&'static str] {
        &["job_no", "task_name", "quoted_hours", "actual_hours"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.job_no.as_str()),
            Cell::from(self.task_name.as_str()),
            Cell::from(self.quoted_hours),
            Cell::from(self.actual_hours),
        ]
    }
}

/// Quote vs actual hours for every task with a positive quote
pub fn quote_accuracy(job_task: &[JobTaskSummary]) -> Vec<QuotePoint> {
    job_task
        .iter()
        .filter_map(|t| {
            let quoted = t.quoted_hours.filter(|q| *q > 0.0)?;
            Some(QuotePoint {
                job_no: t.job_no.clone(),
                task_name: t.task_name.clone(),
                quoted_hours: quoted,
                actual_hours: t.actual_hours,
            })
        })
        .collect()
}
