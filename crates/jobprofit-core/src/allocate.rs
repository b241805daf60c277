//! Revenue allocation
//!
//! Rev-rec revenue is recognised per job-month, with no task breakdown. The
//! allocator splits each job-month's revenue across that job-month's task
//! buckets in proportion to a weight (hours or cost, clamped at zero):
//!
//! ```text
//! rev_allocated = job_month_rev * weight / sum(weights in job-month)
//! ```
//!
//! When the weight sum is zero the ratio is undefined and every row in the
//! job-month gets 0, even if the job-month has revenue. That revenue is not
//! redistributed; it is reported through [`UnallocatedRevenue`] instead.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::TaskMonthBucket;
use crate::normalize::{clean_job_no, FirstOfMonth};
use crate::{
    cmp_month_keys, gm_pct, AllocationMode, ColumnMap, FactRow, RawTable, UnallocatedReason,
    UnallocatedRevenue,
};

/// Recognised revenue summed per job-month
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobMonthRevenue {
    pub job_no: String,
    pub month_key: Option<NaiveDate>,
    pub job_month_rev: f64,
}

/// Sum rev-rec amounts by (job, month).
///
/// Missing or non-numeric amounts count as 0. An absent or empty table
/// yields no revenue at all.
pub fn job_month_revenue(revrec: Option<&RawTable>, columns: &ColumnMap) -> Vec<JobMonthRevenue> {
    let Some(table) = revrec.filter(|t| !t.is_empty()) else {
        return Vec::new();
    };

    let job_col = table.column_index(&columns.rr_job_no);
    let month_col = table.column_index(&columns.rr_month_key);
    let amount_col = table.column_index(&columns.rr_amount);

    let mut totals: HashMap<(String, Option<NaiveDate>), f64> = HashMap::new();
    for row in 0..table.len() {
        let key = (
            clean_job_no(table.cell(row, job_col)),
            table.cell(row, month_col).first_of_month(),
        );
        *totals.entry(key).or_default() += table.cell(row, amount_col).as_number().unwrap_or(0.0);
    }

    let mut revenue: Vec<JobMonthRevenue> = totals
        .into_iter()
        .map(|((job_no, month_key), job_month_rev)| JobMonthRevenue {
            job_no,
            month_key,
            job_month_rev,
        })
        .collect();
    revenue.sort_by(|a, b| {
        a.job_no
            .cmp(&b.job_no)
            .then_with(|| cmp_month_keys(a.month_key, b.month_key))
    });
    revenue
}

/// Allocation weight of a bucket; negatives clamp to 0
pub fn allocation_weight(bucket: &TaskMonthBucket, mode: AllocationMode) -> f64 {
    let raw = match mode {
        AllocationMode::Hours => bucket.total_hours,
        AllocationMode::Cost => bucket.total_cost,
    };
    if raw > 0.0 {
        raw
    } else {
        0.0
    }
}

/// Fact rows with revenue attached, plus whatever revenue found no home
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Allocation {
    pub rows: Vec<FactRow>,
    pub unallocated: Vec<UnallocatedRevenue>,
}

/// Join job-month revenue onto the buckets and split it by weight.
///
/// Job-months without revenue get `job_month_rev = 0`. Buckets without a
/// month still see revenue recorded against a missing month for the same
/// job, but never receive an allocation.
pub fn allocate_revenue(
    buckets: &[TaskMonthBucket],
    revenue: &[JobMonthRevenue],
    mode: AllocationMode,
) -> Allocation {
    let revenue_by_key: HashMap<(&str, Option<NaiveDate>), f64> = revenue
        .iter()
        .map(|r| ((r.job_no.as_str(), r.month_key), r.job_month_rev))
        .collect();

    // Per job-month weight totals (the window sum)
    let mut denominators: BTreeMap<(&str, NaiveDate), f64> = BTreeMap::new();
    for bucket in buckets {
        if let Some(month) = bucket.key.month_key {
            *denominators
                .entry((bucket.key.job_no.as_str(), month))
                .or_default() += allocation_weight(bucket, mode);
        }
    }

    let rows = buckets
        .iter()
        .map(|bucket| {
            let key = &bucket.key;
            let job_month_rev = revenue_by_key
                .get(&(key.job_no.as_str(), key.month_key))
                .copied()
                .unwrap_or(0.0);
            let denominator = key
                .month_key
                .and_then(|m| denominators.get(&(key.job_no.as_str(), m)).copied())
                .filter(|d| *d != 0.0);
            let rev_allocated = denominator
                .map(|d| job_month_rev * (allocation_weight(bucket, mode) / d))
                .unwrap_or(0.0);
            let gross_margin = rev_allocated - bucket.total_cost;

            FactRow {
                job_no: key.job_no.clone(),
                task_name: key.task_name.clone(),
                month_key: key.month_key,
                total_hours: bucket.total_hours,
                total_cost: bucket.total_cost,
                implied_billable: bucket.implied_billable,
                avg_bill_rate: bucket.avg_bill_rate,
                avg_base_rate: bucket.avg_base_rate,
                avg_logged_quoted_rate: bucket.avg_logged_quoted_rate,
                job_month_rev,
                rev_allocated,
                gross_margin,
                gm_pct: gm_pct(gross_margin, rev_allocated),
                quoted_hours: None,
                quoted_rate: None,
            }
        })
        .collect();

    let unallocated = revenue
        .iter()
        .filter(|r| r.job_month_rev != 0.0)
        .filter_map(|r| {
            let reason = match r.month_key {
                None => UnallocatedReason::MissingMonth,
                Some(month) => match denominators.get(&(r.job_no.as_str(), month)) {
                    None => UnallocatedReason::NoTimesheet,
                    Some(d) if *d == 0.0 => UnallocatedReason::ZeroWeight,
                    Some(_) => return None,
                },
            };
            Some(UnallocatedRevenue {
                job_no: r.job_no.clone(),
                month_key: r.month_key,
                job_month_rev: r.job_month_rev,
                reason,
            })
        })
        .collect::<Vec<_>>();

    if !unallocated.is_empty() {
        let amount: f64 = unallocated.iter().map(|u| u.job_month_rev).sum();
        tracing::warn!(
            job_months = unallocated.len(),
            amount,
            "recognised revenue could not be allocated to any task"
        );
    }

    Allocation { rows, unallocated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, FactKey};
    use pretty_assertions::assert_eq;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn bucket(job: &str, task: &str, month: Option<NaiveDate>, hours: f64, cost: f64) -> TaskMonthBucket {
        TaskMonthBucket {
            key: FactKey::new(job, task, month),
            total_hours: hours,
            total_cost: cost,
            implied_billable: 0.0,
            avg_bill_rate: None,
            avg_base_rate: None,
            avg_logged_quoted_rate: None,
            entries: 1,
        }
    }

    fn revenue(job: &str, month: Option<NaiveDate>, amount: f64) -> JobMonthRevenue {
        JobMonthRevenue {
            job_no: job.into(),
            month_key: month,
            job_month_rev: amount,
        }
    }

    #[test]
    fn revrec_rows_sum_per_job_month() {
        let table = RawTable::new(["[Job] Job No.", "MonthKey", "Amount"])
            .with_row(vec![Cell::from(100.0), Cell::from("2024-03-01"), Cell::from(1500.0)])
            .with_row(vec![Cell::from("100"), Cell::from("2024-03-27"), Cell::from("500")])
            .with_row(vec![Cell::from("100"), Cell::from("2024-04-02"), Cell::from("oops")])
            .with_row(vec![Cell::from("099"), Cell::from("2024-03-01"), Cell::from(10.0)]);

        let revenue = job_month_revenue(Some(&table), &ColumnMap::default());
        assert_eq!(
            revenue,
            vec![
                JobMonthRevenue {
                    job_no: "099".into(),
                    month_key: Some(date(2024, 3, 1)),
                    job_month_rev: 10.0
                },
                JobMonthRevenue {
                    job_no: "100".into(),
                    month_key: Some(date(2024, 3, 1)),
                    job_month_rev: 2000.0
                },
                JobMonthRevenue {
                    job_no: "100".into(),
                    month_key: Some(date(2024, 4, 1)),
                    job_month_rev: 0.0
                },
            ]
        );
    }

    #[test]
    fn absent_revrec_is_empty() {
        assert!(job_month_revenue(None, &ColumnMap::default()).is_empty());
        let empty = RawTable::new(["[Job] Job No.", "MonthKey", "Amount"]);
        assert!(job_month_revenue(Some(&empty), &ColumnMap::default()).is_empty());
    }

    #[test]
    fn hours_mode_splits_by_hours_share() {
        let march = Some(date(2024, 3, 1));
        let buckets = vec![
            bucket("100", "Build", march, 30.0, 900.0),
            bucket("100", "Design", march, 10.0, 500.0),
        ];
        let allocation = allocate_revenue(&buckets, &[revenue("100", march, 2000.0)], AllocationMode::Hours);

        assert_eq!(allocation.rows[0].rev_allocated, 1500.0);
        assert_eq!(allocation.rows[1].rev_allocated, 500.0);
        assert_eq!(allocation.rows[0].job_month_rev, 2000.0);
        assert_eq!(allocation.rows[1].gross_margin, 0.0);
        assert!(allocation.unallocated.is_empty());
    }

    #[test]
    fn cost_mode_splits_by_cost_share() {
        let march = Some(date(2024, 3, 1));
        let buckets = vec![
            bucket("100", "Build", march, 30.0, 300.0),
            bucket("100", "Design", march, 10.0, 700.0),
        ];
        let allocation = allocate_revenue(&buckets, &[revenue("100", march, 1000.0)], AllocationMode::Cost);

        assert_eq!(allocation.rows[0].rev_allocated, 300.0);
        assert_eq!(allocation.rows[1].rev_allocated, 700.0);
    }

    #[test]
    fn negative_weights_clamp_to_zero() {
        let march = Some(date(2024, 3, 1));
        let buckets = vec![
            bucket("100", "Credit", march, -4.0, -200.0),
            bucket("100", "Design", march, 8.0, 400.0),
        ];
        let allocation = allocate_revenue(&buckets, &[revenue("100", march, 800.0)], AllocationMode::Hours);

        assert_eq!(allocation.rows[0].rev_allocated, 0.0);
        assert_eq!(allocation.rows[1].rev_allocated, 800.0);
    }

    #[test]
    fn zero_weight_job_month_allocates_nothing() {
        let march = Some(date(2024, 3, 1));
        let buckets = vec![
            bucket("100", "Admin", march, 0.0, 0.0),
            bucket("100", "Review", march, 0.0, 0.0),
        ];
        let allocation = allocate_revenue(&buckets, &[revenue("100", march, 5000.0)], AllocationMode::Hours);

        for row in &allocation.rows {
            assert_eq!(row.job_month_rev, 5000.0);
            assert_eq!(row.rev_allocated, 0.0);
            assert_eq!(row.gm_pct, None);
        }
        assert_eq!(allocation.unallocated.len(), 1);
        assert_eq!(allocation.unallocated[0].reason, UnallocatedReason::ZeroWeight);
        assert_eq!(allocation.unallocated[0].job_month_rev, 5000.0);
    }

    #[test]
    fn revenue_without_timesheet_is_reported() {
        let march = Some(date(2024, 3, 1));
        let april = Some(date(2024, 4, 1));
        let buckets = vec![bucket("100", "Design", march, 10.0, 500.0)];
        let allocation = allocate_revenue(
            &buckets,
            &[
                revenue("100", march, 100.0),
                revenue("100", april, 250.0),
                revenue("300", None, 75.0),
                revenue("400", april, 0.0),
            ],
            AllocationMode::Hours,
        );

        assert_eq!(allocation.rows.len(), 1);
        let reasons: Vec<_> = allocation
            .unallocated
            .iter()
            .map(|u| (u.job_no.as_str(), u.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("100", UnallocatedReason::NoTimesheet),
                ("300", UnallocatedReason::MissingMonth),
            ]
        );
    }

    #[test]
    fn missing_month_rows_join_but_never_allocate() {
        let buckets = vec![bucket("100", "Design", None, 10.0, 500.0)];
        let allocation = allocate_revenue(&buckets, &[revenue("100", None, 900.0)], AllocationMode::Hours);

        assert_eq!(allocation.rows[0].job_month_rev, 900.0);
        assert_eq!(allocation.rows[0].rev_allocated, 0.0);
        assert_eq!(allocation.rows[0].gross_margin, -500.0);
    }

    #[test]
    fn job_months_without_revenue_get_zero() {
        let buckets = vec![bucket("100", "Design", Some(date(2024, 3, 1)), 10.0, 500.0)];
        let allocation = allocate_revenue(&buckets, &[], AllocationMode::Hours);

        assert_eq!(allocation.rows[0].job_month_rev, 0.0);
        assert_eq!(allocation.rows[0].rev_allocated, 0.0);
        assert_eq!(allocation.rows[0].gross_margin, -500.0);
    }
}
