//! Integration tests for workbook loading
//!
//! Workbooks are written with rust_xlsxwriter and read back through the
//! loader, then fed to the pipeline.

use jobprofit_core::{build_fact_tables, Cell, PipelineOptions};
use jobprofit_loader::{load_workbook, load_workbook_bytes, LoadError, SheetRole};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

/// Excel serial for 2024-03-15
const MARCH_15: f64 = 45366.0;

fn job_workbook(timesheet_name: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("yyyy-mm-dd");

    let ts = workbook.add_worksheet();
    ts.set_name(timesheet_name)?;
    for (col, header) in [
        "[Job] Job No.",
        "[Job Task] Name",
        "[Time] Date",
        "[Time] Actual Hrs",
        "Base Rate",
    ]
    .iter()
    .enumerate()
    {
        ts.write_string(0, col as u16, *header)?;
    }
    // column 5 has no header
    ts.write_string(0, 6, "Comment")?;
    ts.write_number(1, 0, 100.0)?;
    ts.write_string(1, 1, "Design")?;
    ts.write_number_with_format(1, 2, MARCH_15, &date)?;
    ts.write_number(1, 3, 10.0)?;
    ts.write_number(1, 4, 50.0)?;
    // row 2 left blank on purpose
    ts.write_string(3, 0, "100")?;
    ts.write_string(3, 1, "Build")?;
    ts.write_string(3, 2, "2024-03-20")?;
    ts.write_number(3, 3, 2.0)?;

    let rr = workbook.add_worksheet();
    rr.set_name("Rev Rec")?;
    rr.write_string(0, 0, "[Job] Job No.")?;
    rr.write_string(0, 1, "MonthKey")?;
    rr.write_string(0, 2, "Amount")?;
    rr.write_string(1, 0, "100")?;
    rr.write_number_with_format(1, 1, MARCH_15, &date)?;
    rr.write_number(1, 2, 2400.0)?;

    let q = workbook.add_worksheet();
    q.set_name("Quotes")?;
    q.write_string(0, 0, "[Job] Job No.")?;
    q.write_string(0, 1, "[Job Task] Name")?;
    q.write_string(0, 2, "Quoted Hours")?;
    q.write_string(1, 0, "100")?;
    q.write_string(1, 1, "Design")?;
    q.write_number(1, 2, 8.0)?;

    workbook.add_worksheet().set_name("Notes")?;

    workbook.save_to_buffer()
}

/// Test: roles, headers, cell types
#[test]
fn loads_role_sheets() {
    let loaded = load_workbook_bytes(job_workbook("WFM Hist").unwrap()).unwrap();

    assert_eq!(loaded.meta.timesheet_sheet.as_deref(), Some("WFM Hist"));
    assert_eq!(loaded.meta.sheet_for(SheetRole::RevRec), Some("Rev Rec"));
    assert_eq!(loaded.meta.sheet_for(SheetRole::Quotes), Some("Quotes"));
    assert_eq!(loaded.meta.sheets, vec!["WFM Hist", "Rev Rec", "Quotes", "Notes"]);

    let ts = loaded.require_timesheet().unwrap();
    assert_eq!(ts.columns()[5], "Unnamed: 5");
    // the blank row is gone
    assert_eq!(ts.len(), 2);
    assert_eq!(
        ts.cell(0, ts.column_index("[Time] Date")),
        &Cell::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    );
    assert_eq!(ts.cell(0, ts.column_index("[Job] Job No.")), &Cell::Number(100.0));
}

/// Test: loaded tables drive the pipeline
#[test]
fn loaded_workbook_feeds_pipeline() {
    let loaded = load_workbook_bytes(job_workbook("Timesheet").unwrap()).unwrap();
    let out = build_fact_tables(
        loaded.require_timesheet().unwrap(),
        loaded.revrec.as_ref(),
        loaded.quotes.as_ref(),
        &PipelineOptions::default(),
    );

    assert_eq!(out.fact_job_task_month.len(), 2);
    let design = out
        .fact_job_task_month
        .iter()
        .find(|r| r.task_name == "Design")
        .unwrap();
    assert_eq!(design.job_no, "100");
    assert_eq!(design.rev_allocated, 2000.0);
    assert_eq!(design.quoted_hours, Some(8.0));

    // Build has hours but no base rate
    assert_eq!(out.qa.count(jobprofit_core::QaCheck::HoursWithoutCost), 1);
}

/// Test: no timesheet-like sheet
#[test]
fn missing_timesheet_is_reported_with_sheet_list() {
    let loaded = load_workbook_bytes(job_workbook("Labour").unwrap()).unwrap();
    assert!(loaded.timesheet.is_none());

    let err = loaded.require_timesheet().unwrap_err();
    assert!(err.to_string().contains("Could not detect a Timesheet/WFM sheet"));
    match err {
        LoadError::MissingTimesheet { sheets } => assert_eq!(sheets.len(), 4),
        other => panic!("unexpected error: {other}"),
    }
}

/// Test: from a file on disk
#[test]
fn loads_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.xlsx");
    std::fs::write(&path, job_workbook("wfm").unwrap()).unwrap();

    let loaded = load_workbook(&path).unwrap();
    assert!(loaded.timesheet.is_some());
}

/// Test: garbage bytes and missing files are errors, not panics
#[test]
fn unreadable_input() {
    assert!(matches!(
        load_workbook_bytes(b"not a workbook".to_vec()),
        Err(LoadError::Workbook(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_workbook(&dir.path().join("absent.xlsx")),
        Err(LoadError::Io(_))
    ));
}
