//! PDF text extraction implementation.

use lopdf::Document;
use roster_core::{DocumentKind, Error, Result, TextExtractor};

use crate::text;

/// A loaded PDF document.
pub struct PdfDocument {
    document: Document,
}

impl PdfDocument {
    /// Load a document from its raw bytes.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if DocumentKind::from_magic(bytes) != Some(DocumentKind::Pdf) {
            return Err(Error::UnsupportedFormat(
                "document is not a PDF file".to_string(),
            ));
        }

        let document = Document::load_mem(bytes)
            .map_err(|e| Error::PdfParseError(format!("Failed to load PDF: {}", e)))?;

        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Text of one page (1-based page number).
    pub fn page_text(&self, page_number: u32) -> Result<String> {
        let page_id = *self
            .document
            .get_pages()
            .get(&page_number)
            .ok_or_else(|| Error::PdfParseError(format!("Page {} not found", page_number)))?;

        text::page_text(&self.document, page_id)
    }

    /// Text of every page in page order.
    pub fn pages_text(&self) -> Result<Vec<String>> {
        self.document
            .get_pages()
            .values()
            .map(|&page_id| text::page_text(&self.document, page_id))
            .collect()
    }
}

/// Extracts the concatenated text of all pages of a PDF.
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    /// Inserted between consecutive pages.
    page_separator: String,
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self {
            page_separator: "\n".to_string(),
        }
    }
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_separator(mut self, separator: impl Into<String>) -> Self {
        self.page_separator = separator.into();
        self
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let document = PdfDocument::load(bytes)?;
        log::debug!("PDF has {} pages", document.page_count());

        Ok(document.pages_text()?.join(&self.page_separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Build a PDF with one page per entry, each line in its own text object.
    fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let pages = pages
            .iter()
            .map(|lines| {
                let mut operations = Vec::new();
                for (i, line) in lines.iter().enumerate() {
                    operations.push(Operation::new("BT", vec![]));
                    operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                    operations.push(Operation::new(
                        "Td",
                        vec![72.into(), (760 - 20 * i as i64).into()],
                    ));
                    operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                    operations.push(Operation::new("ET", vec![]));
                }
                operations
            })
            .collect();
        build_pdf_from_operations(pages)
    }

    /// Build a PDF with one page per operation list; font `F1` is WinAnsi Courier.
    fn build_pdf_from_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extracts_all_pages_in_order() {
        let bytes = build_pdf(&[
            &["Agenda 12/03", "Paciente: 123.456 - Maria Silva"],
            &["Paciente: 789 - Joao"],
        ]);

        let text = PdfTextExtractor::new().extract_text(&bytes).unwrap();
        assert_eq!(
            text,
            "Agenda 12/03\nPaciente: 123.456 - Maria Silva\nPaciente: 789 - Joao"
        );

        let text = PdfTextExtractor::new()
            .with_page_separator("\n--\n")
            .extract_text(&bytes)
            .unwrap();
        assert!(text.contains("Maria Silva\n--\nPaciente: 789"));
    }

    #[test]
    fn test_lines_within_one_text_object() {
        let bytes = build_pdf_from_operations(vec![vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 760.into()]),
            Operation::new("Tj", vec![Object::string_literal("Paciente: 123.456 - Maria Silva")]),
            Operation::new("Td", vec![0.into(), (-20).into()]),
            Operation::new("Tj", vec![Object::string_literal("Paciente: 789 - Joao")]),
            Operation::new("ET", vec![]),
        ]]);

        let text = PdfTextExtractor::new().extract_text(&bytes).unwrap();
        assert_eq!(text, "Paciente: 123.456 - Maria Silva\nPaciente: 789 - Joao");

        let names = roster_core::NameExtractor::default().extract_names(&text);
        assert_eq!(names, vec!["Maria Silva", "Joao"]);
    }

    #[test]
    fn test_page_access() {
        let bytes = build_pdf(&[&["first page"], &["second page"], &["third page"]]);
        let document = PdfDocument::load(&bytes).unwrap();

        assert_eq!(document.page_count(), 3);
        assert!(document.page_text(2).unwrap().contains("second page"));
        assert!(document.page_text(9).is_err());
    }

    #[test]
    fn test_rejects_non_pdf() {
        let err = PdfTextExtractor::new()
            .extract_text(b"PK\x03\x04 spreadsheet")
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_corrupt_pdf() {
        let err = PdfTextExtractor::new()
            .extract_text(b"%PDF-1.4\n garbage without xref")
            .unwrap_err();
        assert!(matches!(err, Error::PdfParseError(_)));
    }
}
