//! Timesheet aggregation
//!
//! Turns raw timesheet lines into one bucket per (job, task, month).
//!
//! Null policy differs by measure:
//! - sums (hours, cost, implied billable) treat a missing value as 0
//! - rate means skip missing values entirely, so a blank rate never drags
//!   the average towards zero

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::normalize::{clean_job_no, clean_task_name, FirstOfMonth};
use crate::{ColumnMap, FactKey, RawTable};

/// A timesheet line after key normalisation and numeric coercion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimesheetEntry {
    pub key: FactKey,
    /// Missing or unparseable hours are 0
    pub hours: f64,
    pub bill_rate: Option<f64>,
    pub base_rate: Option<f64>,
    pub quoted_rate: Option<f64>,
}

impl TimesheetEntry {
    /// hours x base rate, with a missing rate counted as 0
    pub fn cost(&self) -> f64 {
        self.hours * self.base_rate.unwrap_or(0.0)
    }

    /// hours x bill rate, with a missing rate counted as 0
    pub fn implied_billable(&self) -> f64 {
        self.hours * self.bill_rate.unwrap_or(0.0)
    }
}

/// Normalise every timesheet row.
///
/// The month key comes from the explicit month column when that row has a
/// parseable value there, otherwise from the row date. Both are truncated to
/// the first of the month.
pub fn normalize_timesheet(table: &RawTable, columns: &ColumnMap) -> Vec<TimesheetEntry> {
    let job_col = table.column_index(&columns.ts_job_no);
    let task_col = table.column_index(&columns.ts_task);
    let date_col = table.column_index(&columns.ts_date);
    let month_col = table.column_index(&columns.ts_month_key);
    let hours_col = table.column_index(&columns.ts_hours);
    let bill_col = table.column_index(&columns.ts_bill_rate);
    let base_col = table.column_index(&columns.ts_base_rate);
    let quoted_col = table.column_index(&columns.ts_quoted_rate);

    if job_col.is_none() {
        tracing::warn!(column = %columns.ts_job_no, "timesheet has no job number column");
    }

    (0..table.len())
        .map(|row| {
            let month_key = table
                .cell(row, month_col)
                .first_of_month()
                .or_else(|| table.cell(row, date_col).first_of_month());

            TimesheetEntry {
                key: FactKey::new(
                    clean_job_no(table.cell(row, job_col)),
                    clean_task_name(table.cell(row, task_col)),
                    month_key,
                ),
                hours: table.cell(row, hours_col).as_number().unwrap_or(0.0),
                bill_rate: table.cell(row, bill_col).as_number(),
                base_rate: table.cell(row, base_col).as_number(),
                quoted_rate: table.cell(row, quoted_col).as_number(),
            }
        })
        .collect()
}

/// Aggregated timesheet measures for one (job, task, month)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskMonthBucket {
    pub key: FactKey,
    pub total_hours: f64,
    pub total_cost: f64,
    pub implied_billable: f64,
    pub avg_bill_rate: Option<f64>,
    pub avg_base_rate: Option<f64>,
    pub avg_logged_quoted_rate: Option<f64>,
    /// Number of timesheet lines in the bucket
    pub entries: usize,
}

/// Running mean that ignores missing values
#[derive(Clone, Copy, Debug, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Default)]
struct BucketAccumulator {
    hours: f64,
    cost: f64,
    implied_billable: f64,
    bill_rate: Mean,
    base_rate: Mean,
    quoted_rate: Mean,
    entries: usize,
}

/// Group timesheet entries by (job, task, month).
///
/// Buckets come back ordered by key, with missing months last within a
/// job-task. A null month is a group of its own, not a dropped row.
pub fn aggregate_task_months(entries: &[TimesheetEntry]) -> Vec<TaskMonthBucket> {
    let mut groups: BTreeMap<&FactKey, BucketAccumulator> = BTreeMap::new();

    for entry in entries {
        let acc = groups.entry(&entry.key).or_default();
        acc.hours += entry.hours;
        acc.cost += entry.cost();
        acc.implied_billable += entry.implied_billable();
        acc.bill_rate.push(entry.bill_rate);
        acc.base_rate.push(entry.base_rate);
        acc.quoted_rate.push(entry.quoted_rate);
        acc.entries += 1;
    }

    groups
        .into_iter()
        .map(|(key, acc)| TaskMonthBucket {
            key: key.clone(),
            total_hours: acc.hours,
            total_cost: acc.cost,
            implied_billable: acc.implied_billable,
            avg_bill_rate: acc.bill_rate.value(),
            avg_base_rate: acc.base_rate.value(),
            avg_logged_quoted_rate: acc.quoted_rate.value(),
            entries: acc.entries,
        })
        .collect()
}
