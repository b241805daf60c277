//! Excel export
//!
//! Writes named tables to a multi-sheet XLSX workbook, one sheet per table:
//! - Sheet names are the first 31 characters of the table name, with `/`
//!   replaced by `_`
//! - Row 1 holds the column headers (bold, frozen)
//! - Dates are written as Excel serial numbers with a date format, so they
//!   stay sortable and filterable
//! - Empty cells stay blank
//!
//! ## Example Output Structure
//!
//! ```text
//! Sheet: fact_job_task_month
//! | job_no | task_name | month_key  | total_hours | total_cost | ... |
//! |--------|-----------|------------|-------------|------------|-----|
//! | 100    | Design    | 2024-03-01 | 10          | 500        | ... |
//! ```

use jobprofit_core::normalize::date_to_excel_serial;
use jobprofit_core::{Cell, FactOutputs, RawTable, RenderError, Renderer};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

/// Excel's sheet-name length limit
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Sheet name for a table: truncated to 31 characters, `/` replaced by `_`
pub fn sheet_name(name: &str) -> String {
    name.chars()
        .take(MAX_SHEET_NAME_LEN)
        .map(|c| if c == '/' { '_' } else { c })
        .collect()
}

/// Multi-sheet XLSX exporter
#[derive(Clone, Debug)]
pub struct ExcelExporter {
    /// Number format for date cells
    pub date_format: String,
    /// Number format for numeric cells; `None` keeps Excel's General
    pub number_format: Option<String>,
    /// Whether to freeze the header row
    pub freeze_header: bool,
    /// Smallest column width in characters
    pub min_column_width: f64,
}

impl Default for ExcelExporter {
    fn default() -> Self {
        Self {
            date_format: "yyyy-mm-dd".into(),
            number_format: None,
            freeze_header: true,
            min_column_width: 10.0,
        }
    }
}

struct ExportFormats {
    header: Format,
    date: Format,
    number: Option<Format>,
}

impl ExcelExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the date number format
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Set a number format for numeric cells (e.g. `#,##0.00`)
    pub fn number_format(mut self, format: impl Into<String>) -> Self {
        self.number_format = Some(format.into());
        self
    }

    /// Do not freeze the header row
    pub fn no_freeze(mut self) -> Self {
        self.freeze_header = false;
        self
    }

    fn create_formats(&self) -> ExportFormats {
        ExportFormats {
            header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_background_color(0x4472C4)
                .set_font_color(0xFFFFFF)
                .set_border(FormatBorder::Thin),
            date: Format::new().set_num_format(&self.date_format),
            number: self
                .number_format
                .as_deref()
                .map(|f| Format::new().set_num_format(f)),
        }
    }

    /// Write every table to its own sheet and return the workbook bytes
    pub fn export_tables(&self, tables: &[(String, RawTable)]) -> Result<Vec<u8>, RenderError> {
        if tables.is_empty() {
            return Err(RenderError::InvalidData("No tables to export".into()));
        }

        let mut workbook = Workbook::new();
        let formats = self.create_formats();

        for (name, table) in tables {
            let sheet = workbook.add_worksheet();
            sheet
                .set_name(sheet_name(name))
                .map_err(|e| RenderError::Format(format!("Invalid sheet name '{name}': {e}")))?;
            self.write_table(sheet, table, &formats)?;
        }

        workbook
            .save_to_buffer()
            .map_err(|e| RenderError::Format(format!("Failed to create Excel: {e}")))
    }

    fn write_table(
        &self,
        sheet: &mut Worksheet,
        table: &RawTable,
        formats: &ExportFormats,
    ) -> Result<(), RenderError> {
        for (col, header) in table.columns().iter().enumerate() {
            let col = column_index(col)?;
            sheet
                .write_with_format(0, col, header.as_str(), &formats.header)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            let width = (header.chars().count() as f64 + 2.0).max(self.min_column_width);
            sheet.set_column_width(col, width).ok();
        }

        for (r, cells) in table.rows().iter().enumerate() {
            let row = u32::try_from(r + 1)
                .map_err(|_| RenderError::InvalidData(format!("Too many rows: {}", r + 1)))?;
            for (c, cell) in cells.iter().enumerate() {
                write_cell(sheet, row, column_index(c)?, cell, formats)?;
            }
        }

        if self.freeze_header {
            sheet.set_freeze_panes(1, 0).ok();
        }
        Ok(())
    }
}

fn column_index(col: usize) -> Result<u16, RenderError> {
    u16::try_from(col).map_err(|_| RenderError::InvalidData(format!("Too many columns: {col}")))
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    formats: &ExportFormats,
) -> Result<(), RenderError> {
    let result = match cell {
        Cell::Empty => return Ok(()),
        // NaN and infinities have no XLSX representation
        Cell::Number(n) if !n.is_finite() => return Ok(()),
        Cell::Number(n) => match &formats.number {
            Some(format) => sheet.write_number_with_format(row, col, *n, format),
            None => sheet.write_number(row, col, *n),
        },
        Cell::Text(s) => sheet.write_string(row, col, s.as_str()),
        Cell::Bool(b) => sheet.write_boolean(row, col, *b),
        Cell::Date(d) => sheet.write_number_with_format(row, col, date_to_excel_serial(*d), &formats.date),
    };
    result
        .map(|_| ())
        .map_err(|e| RenderError::Format(e.to_string()))
}

/// Exports the whole pipeline bundle
impl Renderer for ExcelExporter {
    type Output = Vec<u8>;

    fn render(&self, outputs: &FactOutputs) -> Result<Vec<u8>, RenderError> {
        self.export_tables(&outputs.named_tables())
    }
}
