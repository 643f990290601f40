//! Error types for patient status checks.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while checking patients against a roster.
#[derive(Error, Debug)]
pub enum Error {
    /// One or both input files were not supplied.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Failed to read an input.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the appointment document.
    #[error("PDF parsing error: {0}")]
    PdfParseError(String),

    /// Failed to parse the roster spreadsheet.
    #[error("Spreadsheet parsing error: {0}")]
    SheetParseError(String),

    /// The roster header row lacks a required column.
    #[error("Roster is missing required column '{0}'")]
    MissingColumn(String),

    /// ZIP archive error (for XLSX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for XLSX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The name extraction pattern is invalid.
    #[error("Invalid extraction pattern: {0}")]
    InvalidPattern(String),
}

impl Error {
    /// Whether this error came from reading or parsing one of the input files.
    pub fn is_parse_failure(&self) -> bool {
        !matches!(self, Error::MissingInput(_) | Error::InvalidPattern(_))
    }
}
