//! # jobprofit-loader
//!
//! Reads a workbook (xlsx, xlsm, xlsb, xls or ods) into [`RawTable`]s and
//! works out which sheet holds the timesheet, the revenue recognition and
//! the quotes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use jobprofit_loader::load_workbook;
//!
//! let workbook = load_workbook("jobs.xlsx".as_ref())?;
//! let timesheet = workbook.require_timesheet()?;
//! println!("{} timesheet rows", timesheet.len());
//! # Ok::<(), jobprofit_loader::LoadError>(())
//! ```

pub mod roles;
pub mod sheet;

pub use roles::{detect_roles, pick_sheet, SheetRole};
pub use sheet::{data_to_cell, range_to_table};

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Reader};
use jobprofit_core::RawTable;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which physical sheet was matched to each role, plus every sheet name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookMeta {
    pub timesheet_sheet: Option<String>,
    pub revrec_sheet: Option<String>,
    pub quotes_sheet: Option<String>,
    pub sheets: Vec<String>,
}

impl WorkbookMeta {
    pub fn sheet_for(&self, role: SheetRole) -> Option<&str> {
        match role {
            SheetRole::Timesheet => self.timesheet_sheet.as_deref(),
            SheetRole::RevRec => self.revrec_sheet.as_deref(),
            SheetRole::Quotes => self.quotes_sheet.as_deref(),
        }
    }
}

/// The role tables of one workbook
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedWorkbook {
    pub timesheet: Option<RawTable>,
    pub revrec: Option<RawTable>,
    pub quotes: Option<RawTable>,
    pub meta: WorkbookMeta,
}

impl LoadedWorkbook {
    /// The timesheet table, or the error that asks for a renamed sheet
    pub fn require_timesheet(&self) -> Result<&RawTable, LoadError> {
        self.timesheet.as_ref().ok_or_else(|| LoadError::MissingTimesheet {
            sheets: self.meta.sheets.clone(),
        })
    }
}

/// Workbook loading error
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error(
        "Could not detect a Timesheet/WFM sheet in the workbook. \
         Rename the sheet to include 'WFM' or 'Timesheet'."
    )]
    MissingTimesheet { sheets: Vec<String> },
}

/// Load a workbook from raw bytes.
///
/// The format is sniffed from the content. Roles without a matching sheet
/// are `None`; a missing timesheet is only an error once the caller asks
/// for it.
pub fn load_workbook_bytes(bytes: Vec<u8>) -> Result<LoadedWorkbook, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheets = workbook.sheet_names();

    let mut loaded = LoadedWorkbook {
        meta: WorkbookMeta {
            sheets: sheets.clone(),
            ..WorkbookMeta::default()
        },
        ..LoadedWorkbook::default()
    };

    for (role, sheet) in detect_roles(&sheets) {
        let Some(sheet) = sheet else {
            tracing::debug!(role = %role, "no sheet matched");
            continue;
        };
        let range = workbook.worksheet_range(&sheet)?;
        let table = range_to_table(&range);
        tracing::debug!(role = %role, sheet = %sheet, rows = table.len(), "sheet loaded");

        match role {
            SheetRole::Timesheet => {
                loaded.timesheet = Some(table);
                loaded.meta.timesheet_sheet = Some(sheet);
            }
            SheetRole::RevRec => {
                loaded.revrec = Some(table);
                loaded.meta.revrec_sheet = Some(sheet);
            }
            SheetRole::Quotes => {
                loaded.quotes = Some(table);
                loaded.meta.quotes_sheet = Some(sheet);
            }
        }
    }

    Ok(loaded)
}

/// Load a workbook file
pub fn load_workbook(path: &Path) -> Result<LoadedWorkbook, LoadError> {
    let bytes = std::fs::read(path)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "reading workbook");
    load_workbook_bytes(bytes)
}
