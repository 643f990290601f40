//! Spreadsheet roster parser backend for patient status checks.
//!
//! Parses .xlsx workbooks, which are ZIP archives containing XML documents,
//! and reads the first worksheet as a header row plus data rows. Legacy .xls
//! and OpenDocument .ods workbooks are read with calamine.

pub mod parser;
pub mod workbook;

pub use parser::{SheetTable, XlsxParser};
