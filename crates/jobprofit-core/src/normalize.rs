//! Key normalisation
//!
//! Cleans raw identifier and date fields into the canonical forms used as
//! join keys: `job_no`, `task_name` and the first-of-month `month_key`.
//!
//! None of these functions fail. Missing or unparseable input maps to an
//! empty string (identifiers) or `None` (dates).

use std::borrow::Cow;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::Cell;

/// Anything that may carry an identifier as text
pub trait RawText {
    /// Text form of the value, `None` for null/NaN
    fn raw_text(&self) -> Option<Cow<'_, str>>;
}

impl RawText for str {
    fn raw_text(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self))
    }
}

impl RawText for String {
    fn raw_text(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl RawText for f64 {
    fn raw_text(&self) -> Option<Cow<'_, str>> {
        (!self.is_nan()).then(|| Cow::Owned(self.to_string()))
    }
}

impl RawText for Cell {
    fn raw_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Text(s) => Some(Cow::Borrowed(s.as_str())),
            other => other.as_text().map(Cow::Owned),
        }
    }
}

impl<T: RawText> RawText for Option<T> {
    fn raw_text(&self) -> Option<Cow<'_, str>> {
        self.as_ref().and_then(RawText::raw_text)
    }
}

impl<T: RawText + ?Sized> RawText for &T {
    fn raw_text(&self) -> Option<Cow<'_, str>> {
        (**self).raw_text()
    }
}

/// Normalise a job number coming from a spreadsheet.
///
/// Trims, drops non-breaking spaces, strips the `.0` suffix left by
/// float-typed cells and keeps only ASCII alphanumerics and `-_/`.
///
/// ```
/// use jobprofit_core::clean_job_no;
///
/// assert_eq!(clean_job_no("12345.0"), "12345");
/// assert_eq!(clean_job_no(" JOB 7/A "), "JOB7/A");
/// assert_eq!(clean_job_no(&None::<&str>), "");
/// ```
pub fn clean_job_no<T: RawText + ?Sized>(raw: &T) -> String {
    let Some(text) = raw.raw_text() else {
        return String::new();
    };
    let text = text.trim().replace('\u{a0}', " ");
    strip_float_suffix(&text)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
        .collect()
}

/// Remove a trailing `.0`, `.00`, ... run
fn strip_float_suffix(s: &str) -> &str {
    let without_zeros = s.trim_end_matches('0');
    if without_zeros.len() < s.len() {
        if let Some(stripped) = without_zeros.strip_suffix('.') {
            return stripped;
        }
    }
    s
}

/// Normalise a task name: trim and collapse whitespace runs to one space.
pub fn clean_task_name<T: RawText + ?Sized>(raw: &T) -> String {
    raw.raw_text()
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

// ============================================================================
// Month keys
// ============================================================================

/// Values that can be truncated to the first day of their month.
///
/// Implemented for single values and for slices, so the same call works on a
/// scalar or a whole column.
pub trait FirstOfMonth {
    type Output;

    fn first_of_month(&self) -> Self::Output;
}

impl FirstOfMonth for NaiveDate {
    type Output = NaiveDate;

    fn first_of_month(&self) -> NaiveDate {
        self.with_day(1).unwrap_or(*self)
    }
}

impl FirstOfMonth for NaiveDateTime {
    type Output = NaiveDate;

    fn first_of_month(&self) -> NaiveDate {
        self.date().first_of_month()
    }
}

impl<T: FirstOfMonth> FirstOfMonth for Option<T> {
    type Output = Option<T::Output>;

    fn first_of_month(&self) -> Self::Output {
        self.as_ref().map(FirstOfMonth::first_of_month)
    }
}

impl FirstOfMonth for Cell {
    type Output = Option<NaiveDate>;

    fn first_of_month(&self) -> Option<NaiveDate> {
        self.as_date().map(|d| d.first_of_month())
    }
}

impl<T: FirstOfMonth> FirstOfMonth for [T] {
    type Output = Vec<T::Output>;

    fn first_of_month(&self) -> Self::Output {
        self.iter().map(FirstOfMonth::first_of_month).collect()
    }
}

/// Map a date (or a column of dates) to the first day of its month.
/// Nulls stay null.
pub fn month_key_first_of_month<T: FirstOfMonth + ?Sized>(value: &T) -> T::Output {
    value.first_of_month()
}

// ============================================================================
// Date parsing
// ============================================================================

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

// Month-first before day-first, matching the usual spreadsheet export.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%b-%Y", "%d %b %Y", "%b %d, %Y",
];

// Year-month text, parsed with a day of 1 appended. `%b` also takes full
// month names.
const MONTH_FORMATS: &[&str] = &["%Y-%m %d", "%Y/%m %d", "%m/%Y %d", "%b %Y %d", "%b-%Y %d"];

/// Best-effort date parsing of free text; `None` when nothing matches.
///
/// Year-month text such as `2024-03` or `Mar 2024` reads as the first of
/// that month.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })
        .or_else(|| {
            let with_day = format!("{text} 1");
            MONTH_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&with_day, fmt).ok())
        })
}

/// Largest serial Excel can display (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Convert an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(chrono::Days::new(serial.floor() as u64))
}

/// Convert a date to its Excel serial day number (1900 date system).
pub fn date_to_excel_serial(date: NaiveDate) -> f64 {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .map(|epoch| (date - epoch).num_days() as f64)
        .unwrap_or_default()
}
