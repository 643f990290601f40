//! Legacy .xls and OpenDocument .ods workbooks, read through calamine.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use roster_core::{Error, Result};
use std::io::Cursor;

use crate::parser::SheetTable;

/// Read the cell text of the first worksheet of an .xls or .ods workbook.
pub fn read_first_sheet(bytes: &[u8]) -> Result<SheetTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::SheetParseError(format!("Failed to open workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::SheetParseError("No sheets found in workbook".to_string()))?;
    log::debug!("Reading worksheet '{}'", sheet_name);

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        Error::SheetParseError(format!("Failed to read sheet '{}': {}", sheet_name, e))
    })?;

    Ok(table_from_range(&range))
}

fn table_from_range(range: &Range<Data>) -> SheetTable {
    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());

    SheetTable {
        headers: rows.next().unwrap_or_default(),
        rows: rows.collect(),
    }
}

/// Cell text as the OOXML reader would produce it.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{:.0}", f),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        other => other.to_string(),
    }
}
