//! Worksheet range to `RawTable` conversion

use std::collections::HashMap;

use calamine::{Data, Range};
use jobprofit_core::normalize::{excel_serial_to_date, parse_date};
use jobprofit_core::{Cell, RawTable};

/// Convert one calamine value.
///
/// Blank strings and error cells become `Cell::Empty`; date-time cells keep
/// only their date.
pub fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::from(*i),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).map_or(Cell::Empty, Cell::Date),
        Data::DateTimeIso(s) => parse_date(s).map_or_else(|| Cell::Text(s.clone()), Cell::Date),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Header text for a column; blanks get a positional placeholder
fn header_name(data: Option<&Data>, index: usize) -> String {
    let name = match data.map(data_to_cell) {
        Some(Cell::Text(s)) => s.trim().to_string(),
        Some(cell) => cell.as_text().unwrap_or_default(),
        None => String::new(),
    };
    if name.is_empty() {
        format!("Unnamed: {index}")
    } else {
        name
    }
}

/// Make repeated headers unique with `.1`, `.2`, ... suffixes
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());
    for header in headers {
        let count = seen.entry(header.clone()).or_insert(0);
        if *count == 0 {
            out.push(header);
        } else {
            out.push(format!("{header}.{count}"));
        }
        *count += 1;
    }
    out
}

/// Read a worksheet range: first row is the header, fully blank rows are
/// skipped.
pub fn range_to_table(range: &Range<Data>) -> RawTable {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return RawTable::default();
    };

    let width = range.width();
    let headers = dedupe_headers(
        (0..width)
            .map(|i| header_name(header_row.get(i), i))
            .collect(),
    );

    let mut table = RawTable::new(headers);
    for row in rows {
        let cells: Vec<Cell> = (0..width)
            .map(|i| row.get(i).map(data_to_cell).unwrap_or_default())
            .collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    table
}
