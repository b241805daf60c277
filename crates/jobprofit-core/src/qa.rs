//! Data-quality checks over the fact table
//!
//! Checks only observe. A flagged row stays in the fact table, and one row
//! may be flagged by several checks.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::FactRow;

/// A named QA filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QaCheck {
    #[serde(rename = "missing_job_no")]
    MissingJobNo,
    #[serde(rename = "missing_month_key")]
    MissingMonthKey,
    #[serde(rename = "hours_gt0_cost_eq0")]
    HoursWithoutCost,
}

impl QaCheck {
    pub const ALL: [QaCheck; 3] = [
        QaCheck::MissingJobNo,
        QaCheck::MissingMonthKey,
        QaCheck::HoursWithoutCost,
    ];

    /// Stable check name, used as the report key and export sheet name
    pub fn as_str(&self) -> &'static str {
        match self {
            QaCheck::MissingJobNo => "missing_job_no",
            QaCheck::MissingMonthKey => "missing_month_key",
            QaCheck::HoursWithoutCost => "hours_gt0_cost_eq0",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QaCheck::MissingJobNo => "Job number is blank after cleaning",
            QaCheck::MissingMonthKey => "No month could be derived from the date",
            QaCheck::HoursWithoutCost => "Hours recorded but cost is zero (missing base rate?)",
        }
    }

    pub fn matches(&self, row: &FactRow) -> bool {
        match self {
            QaCheck::MissingJobNo => row.job_no.is_empty(),
            QaCheck::MissingMonthKey => row.month_key.is_none(),
            QaCheck::HoursWithoutCost => row.total_hours > 0.0 && row.total_cost == 0.0,
        }
    }
}

impl fmt::Display for QaCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flagged rows per check; every check is present, possibly empty
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    flagged: BTreeMap<QaCheck, Vec<FactRow>>,
}

impl QaReport {
    /// Run every check over the fact table.
    pub fn audit(fact: &[FactRow]) -> Self {
        let flagged: BTreeMap<_, _> = QaCheck::ALL
            .into_iter()
            .map(|check| {
                let rows: Vec<FactRow> = fact.iter().filter(|r| check.matches(r)).cloned().collect();
                if !rows.is_empty() {
                    tracing::warn!(check = %check, rows = rows.len(), "QA check flagged rows");
                }
                (check, rows)
            })
            .collect();
        Self { flagged }
    }

    /// Rows flagged by one check
    pub fn get(&self, check: QaCheck) -> &[FactRow] {
        self.flagged.get(&check).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn count(&self, check: QaCheck) -> usize {
        self.get(check).len()
    }

    /// Checks in a stable order with their flagged rows
    pub fn iter(&self) -> impl Iterator<Item = (QaCheck, &[FactRow])> {
        QaCheck::ALL.into_iter().map(move |check| (check, self.get(check)))
    }

    /// Flags across all checks (a row flagged twice counts twice)
    pub fn total_flagged(&self) -> usize {
        self.flagged.values().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total_flagged() == 0
    }
}
