//! Pipeline configuration
//!
//! Column names are data, not constants: every field of [`ColumnMap`] can be
//! overridden, and the whole [`PipelineOptions`] record can be read from a
//! TOML file.
//!
//! ```toml
//! allocation = "cost"
//!
//! [columns]
//! ts_job_no = "Job"
//! rr_amount = "Recognised"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Source column names for the three input tables
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMap {
    // Timesheet
    pub ts_job_no: String,
    pub ts_task: String,
    pub ts_date: String,
    pub ts_hours: String,
    pub ts_bill_rate: String,
    pub ts_base_rate: String,
    pub ts_quoted_rate: String,
    /// Optional explicit month; rows without one fall back to `ts_date`
    pub ts_month_key: String,

    // Rev rec
    pub rr_job_no: String,
    /// Any date within the revenue month
    pub rr_month_key: String,
    pub rr_amount: String,

    // Quotes
    pub q_job_no: String,
    /// Optional; quotes without a task are job-level
    pub q_task: String,
    pub q_quoted_hours: String,
    pub q_quoted_rate: String,
    pub q_quote_date: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            ts_job_no: "[Job] Job No.".into(),
            ts_task: "[Job Task] Name".into(),
            ts_date: "[Time] Date".into(),
            ts_hours: "[Time] Actual Hrs".into(),
            ts_bill_rate: "Billable Rate".into(),
            ts_base_rate: "Base Rate".into(),
            ts_quoted_rate: "Quoted Rate".into(),
            ts_month_key: "Month Key".into(),
            rr_job_no: "[Job] Job No.".into(),
            rr_month_key: "MonthKey".into(),
            rr_amount: "Amount".into(),
            q_job_no: "[Job] Job No.".into(),
            q_task: "[Job Task] Name".into(),
            q_quoted_hours: "Quoted Hours".into(),
            q_quoted_rate: "Quoted Rate".into(),
            q_quote_date: "Quote Date".into(),
        }
    }
}

impl ColumnMap {
    /// All (field, column name) pairs in declaration order
    pub fn fields(&self) -> [(&'static str, &str); 16] {
        [
            ("ts_job_no", self.ts_job_no.as_str()),
            ("ts_task", self.ts_task.as_str()),
            ("ts_date", self.ts_date.as_str()),
            ("ts_hours", self.ts_hours.as_str()),
            ("ts_bill_rate", self.ts_bill_rate.as_str()),
            ("ts_base_rate", self.ts_base_rate.as_str()),
            ("ts_quoted_rate", self.ts_quoted_rate.as_str()),
            ("ts_month_key", self.ts_month_key.as_str()),
            ("rr_job_no", self.rr_job_no.as_str()),
            ("rr_month_key", self.rr_month_key.as_str()),
            ("rr_amount", self.rr_amount.as_str()),
            ("q_job_no", self.q_job_no.as_str()),
            ("q_task", self.q_task.as_str()),
            ("q_quoted_hours", self.q_quoted_hours.as_str()),
            ("q_quoted_rate", self.q_quoted_rate.as_str()),
            ("q_quote_date", self.q_quote_date.as_str()),
        ]
    }
}

/// How job-month revenue is split across the tasks of that job-month
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AllocationMode {
    /// Weight by hours share
    #[default]
    Hours,
    /// Weight by cost share
    Cost,
}

impl AllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMode::Hours => "hours",
            AllocationMode::Cost => "cost",
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AllocationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hours" => Ok(AllocationMode::Hours),
            "cost" => Ok(AllocationMode::Cost),
            _ => Err(ConfigError::InvalidAllocation(s.to_string())),
        }
    }
}

impl TryFrom<String> for AllocationMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Everything the pipeline needs besides the input tables
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    pub columns: ColumnMap,
    pub allocation: AllocationMode,
}

impl PipelineOptions {
    /// Set the allocation mode (builder pattern)
    pub fn allocation(mut self, mode: AllocationMode) -> Self {
        self.allocation = mode;
        self
    }

    /// Set the column mapping (builder pattern)
    pub fn columns(mut self, columns: ColumnMap) -> Self {
        self.columns = columns;
        self
    }

    /// Parse options from TOML text; omitted fields keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read options from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let options = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), allocation = %options.allocation, "loaded pipeline options");
        Ok(options)
    }
}
