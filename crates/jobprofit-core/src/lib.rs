//! # jobprofit-core
//!
//! Core domain model and fact-table pipeline for job profitability analysis.
//!
//! This crate provides:
//! - Input types: `Cell`, `RawTable` (already-parsed sheets with named columns)
//! - Output types: `FactRow`, `JobMonthSummary`, `JobTaskSummary`, `UnallocatedRevenue`
//! - The pipeline: normalisation, aggregation, revenue allocation, quote join,
//!   summaries and QA checks (`build_fact_tables`)
//! - Reporting helpers (`metrics`) and a memoization layer (`cache`)
//! - Configuration (`ColumnMap`, `AllocationMode`, `PipelineOptions`)
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use jobprofit_core::{build_fact_tables, Cell, PipelineOptions, RawTable};
//!
//! let timesheet = RawTable::new([
//!     "[Job] Job No.",
//!     "[Job Task] Name",
//!     "[Time] Date",
//!     "[Time] Actual Hrs",
//!     "Base Rate",
//! ])
//! .with_row(vec![
//!     Cell::from("100"),
//!     Cell::from("Design"),
//!     Cell::from(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
//!     Cell::from(10.0),
//!     Cell::from(50.0),
//! ]);
//!
//! let outputs = build_fact_tables(&timesheet, None, None, &PipelineOptions::default());
//! let row = &outputs.fact_job_task_month[0];
//! assert_eq!(row.total_cost, 500.0);
//! assert_eq!(row.gross_margin, -500.0);
//! ```

pub mod aggregate;
pub mod allocate;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod qa;
pub mod quotes;
pub mod summary;

pub use cache::{CacheKey, PipelineCache};
pub use config::{AllocationMode, ColumnMap, PipelineOptions};
pub use normalize::{clean_job_no, clean_task_name, month_key_first_of_month};
pub use pipeline::{build_fact_tables, FactOutputs};
pub use qa::{QaCheck, QaReport};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

// ============================================================================
// Cells and raw tables
// ============================================================================

/// A single spreadsheet value as delivered by a loader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    /// True for blanks and NaN numbers
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Numeric coercion. Unparseable values become `None`, never an error.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if !n.is_nan() => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Date coercion.
    ///
    /// Text goes through [`normalize::parse_date`]; numbers are read as Excel
    /// serial days (1900 date system).
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => normalize::parse_date(s),
            Cell::Number(n) => normalize::excel_serial_to_date(*n),
            _ => None,
        }
    }

    /// Text rendering used for identifiers; `None` for blanks.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
            Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Empty, Into::into)
    }
}

static EMPTY_CELL: Cell = Cell::Empty;

/// An in-memory sheet: ordered column names and ordered rows of cells.
///
/// Column lookup is by exact name. A column that does not exist reads as
/// `Cell::Empty` for every row, so optional columns never need special casing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Create an empty table with the given column names
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row (builder pattern)
    pub fn with_row(mut self, row: Vec<Cell>) -> Self {
        self.push_row(row);
        self
    }

    /// Append a row
    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `row` in the column at `column`; missing columns and short
    /// rows read as empty.
    pub fn cell(&self, row: usize, column: Option<usize>) -> &Cell {
        column
            .and_then(|c| self.rows.get(row).and_then(|r| r.get(c)))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Build a table from typed output records
    pub fn from_records<T: Tabular>(records: &[T]) -> Self {
        Self {
            columns: T::headers().iter().map(|h| (*h).to_string()).collect(),
            rows: records.iter().map(Tabular::cells).collect(),
        }
    }
}

/// Output records that can be laid out as a table
pub trait Tabular {
    /// Column headers, in cell order
    fn headers() -> &'static [&'static str];

    /// One cell per header
    fn cells(&self) -> Vec<Cell>;
}

// ============================================================================
// Keys
// ============================================================================

/// Month keys sort ascending with missing months last.
pub fn cmp_month_keys(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Canonical (job, task, month) grain of the fact table
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactKey {
    pub job_no: String,
    pub task_name: String,
    /// First day of the month; `None` when no date could be derived
    pub month_key: Option<NaiveDate>,
}

impl FactKey {
    pub fn new(
        job_no: impl Into<String>,
        task_name: impl Into<String>,
        month_key: Option<NaiveDate>,
    ) -> Self {
        Self {
            job_no: job_no.into(),
            task_name: task_name.into(),
            month_key,
        }
    }
}

impl Ord for FactKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.job_no
            .cmp(&other.job_no)
            .then_with(|| self.task_name.cmp(&other.task_name))
            .then_with(|| cmp_month_keys(self.month_key, other.month_key))
    }
}

impl PartialOrd for FactKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Margin over revenue, undefined when revenue is exactly zero
pub fn gm_pct(margin: f64, revenue: f64) -> Option<f64> {
    (revenue != 0.0).then(|| margin / revenue)
}

// ============================================================================
// Fact table
// ============================================================================

/// One (job, task, month) row of the profitability fact table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub job_no: String,
    pub task_name: String,
    pub month_key: Option<NaiveDate>,
    pub total_hours: f64,
    /// Sum of hours x base rate (missing rate counts as 0)
    pub total_cost: f64,
    /// Sum of hours x bill rate (missing rate counts as 0)
    pub implied_billable: f64,
    /// Mean bill rate over rows that have one
    pub avg_bill_rate: Option<f64>,
    /// Mean base rate over rows that have one
    pub avg_base_rate: Option<f64>,
    /// Mean of the quoted rate recorded on the timesheet itself
    pub avg_logged_quoted_rate: Option<f64>,
    /// Revenue recognised for the whole job-month
    pub job_month_rev: f64,
    /// This row's share of `job_month_rev`
    pub rev_allocated: f64,
    pub gross_margin: f64,
    pub gm_pct: Option<f64>,
    pub quoted_hours: Option<f64>,
    pub quoted_rate: Option<f64>,
}

impl FactRow {
    pub fn key(&self) -> FactKey {
        FactKey::new(self.job_no.clone(), self.task_name.clone(), self.month_key)
    }
}

impl Tabular for FactRow {
    fn headers() -> &'static [&'static str] {
        &[
            "job_no",
            "task_name",
            "month_key",
            "total_hours",
            "total_cost",
            "implied_billable",
            "avg_bill_rate",
            "avg_base_rate",
            "avg_logged_quoted_rate",
            "job_month_rev",
            "rev_allocated",
            "gross_margin",
            "gm_pct",
            "quoted_hours",
            "quoted_rate",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.job_no.as_str()),
            Cell::from(self.task_name.as_str()),
            Cell::from(self.month_key),
            Cell::from(self.total_hours),
            Cell::from(self.total_cost),
            Cell::from(self.implied_billable),
            Cell::from(self.avg_bill_rate),
            Cell::from(self.avg_base_rate),
            Cell::from(self.avg_logged_quoted_rate),
            Cell::from(self.job_month_rev),
            Cell::from(self.rev_allocated),
            Cell::from(self.gross_margin),
            Cell::from(self.gm_pct),
            Cell::from(self.quoted_hours),
            Cell::from(self.quoted_rate),
        ]
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Job-month roll-up across all tasks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobMonthSummary {
    pub job_no: String,
    pub month_key: Option<NaiveDate>,
    pub rev: f64,
    pub cost: f64,
    pub hours: f64,
    pub gm: f64,
    pub gm_pct: Option<f64>,
}

impl Tabular for JobMonthSummary {
    fn headers() -> &'static [&'static str] {
        &["job_no", "month_key", "rev", "cost", "hours", "gm", "gm_pct"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.job_no.as_str()),
            Cell::from(self.month_key),
            Cell::from(self.rev),
            Cell::from(self.cost),
            Cell::from(self.hours),
            Cell::from(self.gm),
            Cell::from(self.gm_pct),
        ]
    }
}

/// Job-task roll-up across all months, with quote variance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobTaskSummary {
    pub job_no: String,
    pub task_name: String,
    pub actual_hours: f64,
    pub actual_cost: f64,
    pub actual_rev: f64,
    pub gross_margin: f64,
    pub gm_pct: Option<f64>,
    /// Total quoted hours for the job-task; `None` when no quote matched
    pub quoted_hours: Option<f64>,
    /// actual_hours - quoted_hours, with a missing quote counted as 0
    pub hour_variance: f64,
    pub is_unquoted_task: bool,
    pub latest_quote_date: Option<NaiveDate>,
}

impl Tabular for JobTaskSummary {
    fn headers() -> &'static [&'static str] {
        &[
            "job_no",
            "task_name",
            "actual_hours",
            "actual_cost",
            "actual_rev",
            "gross_margin",
            "gm_pct",
            "quoted_hours",
            "hour_variance",
            "is_unquoted_task",
            "latest_quote_date",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.job_no.as_str()),
            Cell::from(self.task_name.as_str()),
            Cell::from(self.actual_hours),
            Cell::from(self.actual_cost),
            Cell::from(self.actual_rev),
            Cell::from(self.gross_margin),
            Cell::from(self.gm_pct),
            Cell::from(self.quoted_hours),
            Cell::from(self.hour_variance),
            Cell::from(self.is_unquoted_task),
            Cell::from(self.latest_quote_date),
        ]
    }
}

/// Why recognised revenue for a job-month reached no fact row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnallocatedReason {
    /// Timesheet rows exist for the job-month but carry no hours/cost weight
    ZeroWeight,
    /// No timesheet rows exist for the job-month
    NoTimesheet,
    /// The rev-rec month could not be parsed
    MissingMonth,
}

impl UnallocatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnallocatedReason::ZeroWeight => "zero_weight",
            UnallocatedReason::NoTimesheet => "no_timesheet",
            UnallocatedReason::MissingMonth => "missing_month",
        }
    }
}

impl std::fmt::Display for UnallocatedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rev-rec revenue that the allocator could not place on any task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnallocatedRevenue {
    pub job_no: String,
    pub month_key: Option<NaiveDate>,
    pub job_month_rev: f64,
    pub reason: UnallocatedReason,
}

impl Tabular for UnallocatedRevenue {
    fn headers() -> &'static [&'static str] {
        &["job_no", "month_key", "job_month_rev", "reason"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.job_no.as_str()),
            Cell::from(self.month_key),
            Cell::from(self.job_month_rev),
            Cell::from(self.reason.as_str()),
        ]
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Output rendering of a pipeline run
pub trait Renderer {
    type Output;

    fn render(&self, outputs: &FactOutputs) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown revenue allocation mode '{0}' (expected 'hours' or 'cost')")]
    InvalidAllocation(String),
}

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn cell_number_coercion() {
        assert_eq!(Cell::from(2.5).as_number(), Some(2.5));
        assert_eq!(Cell::from(" 12 ").as_number(), Some(12.0));
        assert_eq!(Cell::from("n/a").as_number(), None);
        assert_eq!(Cell::Number(f64::NAN).as_number(), None);
        assert_eq!(Cell::from(true).as_number(), Some(1.0));
        assert_eq!(Cell::Empty.as_number(), None);
        assert_eq!(Cell::from(date(2024, 1, 1)).as_number(), None);
    }

    #[test]
    fn cell_date_coercion() {
        assert_eq!(Cell::from("2024-03-15").as_date(), Some(date(2024, 3, 15)));
        assert_eq!(Cell::from(date(2024, 3, 15)).as_date(), Some(date(2024, 3, 15)));
        // 45366 is 2024-03-15 in the 1900 date system
        assert_eq!(Cell::from(45366.0).as_date(), Some(date(2024, 3, 15)));
        assert_eq!(Cell::from("not a date").as_date(), None);
        assert_eq!(Cell::Empty.as_date(), None);
    }

    #[test]
    fn cell_text_for_identifiers() {
        assert_eq!(Cell::from(12345.0).as_text().as_deref(), Some("12345"));
        assert_eq!(Cell::Number(f64::NAN).as_text(), None);
        assert_eq!(Cell::Empty.as_text(), None);
        assert!(Cell::Number(f64::NAN).is_empty());
    }

    #[test]
    fn raw_table_missing_column_reads_empty() {
        let table = RawTable::new(["a", "b"]).with_row(vec![Cell::from(1.0)]);
        assert_eq!(table.cell(0, table.column_index("a")), &Cell::Number(1.0));
        // short row
        assert_eq!(table.cell(0, table.column_index("b")), &Cell::Empty);
        // absent column
        assert_eq!(table.cell(0, table.column_index("zzz")), &Cell::Empty);
        // out of range row
        assert_eq!(table.cell(9, Some(0)), &Cell::Empty);
    }

    #[test]
    fn fact_key_orders_missing_month_last() {
        let mut keys = vec![
            FactKey::new("100", "Design", None),
            FactKey::new("100", "Design", Some(date(2024, 3, 1))),
            FactKey::new("100", "Build", Some(date(2024, 4, 1))),
            FactKey::new("099", "Design", None),
        ];
        keys.sort();
        assert_eq!(keys[0].job_no, "099");
        assert_eq!(keys[1].task_name, "Build");
        assert_eq!(keys[2].month_key, Some(date(2024, 3, 1)));
        assert_eq!(keys[3].month_key, None);
    }

    #[test]
    fn gm_pct_is_undefined_for_zero_revenue() {
        assert_eq!(gm_pct(1500.0, 2000.0), Some(0.75));
        assert_eq!(gm_pct(-500.0, 0.0), None);
    }

    #[test]
    fn records_become_tables() {
        let rows = vec![UnallocatedRevenue {
            job_no: "100".into(),
            month_key: Some(date(2024, 3, 1)),
            job_month_rev: 2000.0,
            reason: UnallocatedReason::ZeroWeight,
        }];
        let table = RawTable::from_records(&rows);
        assert_eq!(table.columns().len(), UnallocatedRevenue::headers().len());
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, table.column_index("reason")), &Cell::from("zero_weight"));
    }
}
