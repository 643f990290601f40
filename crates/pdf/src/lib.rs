//! PDF text extraction backend for patient status checks.
//!
//! Loads appointment documents and concatenates the text of every page.

pub mod extractor;
mod text;

pub use extractor::{PdfDocument, PdfTextExtractor};
