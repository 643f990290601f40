//! Page text assembly from content stream operations.
//!
//! Fragments shown on the same baseline are joined with a space. Moving to a
//! new line (`Td`/`TD` with a vertical offset, `T*`, `'`, `"`, a `Tm` onto a
//! different baseline) or ending a text object starts a new line.

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Object, ObjectId};
use roster_core::{Error, Result};
use std::collections::BTreeMap;

/// `TJ` adjustments below this (thousandths of text space) read as a word gap.
const WORD_GAP: f32 = -100.0;

/// Text of one page, one output line per text line.
pub fn page_text(document: &Document, page_id: ObjectId) -> Result<String> {
    let fonts = document
        .get_page_fonts(page_id)
        .map_err(|e| Error::PdfParseError(format!("Failed to read page fonts: {}", e)))?;

    let mut encodings: BTreeMap<Vec<u8>, Encoding> = BTreeMap::new();
    for (name, font) in fonts {
        match font.get_font_encoding(document) {
            Ok(encoding) => {
                encodings.insert(name, encoding);
            }
            Err(e) => log::warn!(
                "Skipping font {}: {}",
                String::from_utf8_lossy(&name),
                e
            ),
        }
    }

    let content = document
        .get_and_decode_page_content(page_id)
        .map_err(|e| Error::PdfParseError(format!("Failed to decode page content: {}", e)))?;

    let mut text = PageText::default();
    let mut encoding = None;

    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                encoding = operation
                    .operands
                    .first()
                    .and_then(|font| font.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            _ => text.apply(operation, encoding),
        }
    }

    Ok(text.finish())
}

/// Accumulates text while walking a page's operations.
#[derive(Debug, Default)]
struct PageText {
    text: String,
    /// Vertical position of the current line, once a `Tm` has set it.
    baseline: Option<f32>,
}

impl PageText {
    fn apply(&mut self, operation: &Operation, encoding: Option<&Encoding>) {
        let operands = &operation.operands;

        match operation.operator.as_str() {
            "BT" => self.baseline = None,
            "ET" | "T*" => self.new_line(),
            "Td" | "TD" => {
                let dy = operands.get(1).and_then(|o| o.as_float().ok()).unwrap_or(0.0);
                if dy != 0.0 {
                    self.new_line();
                }
                if let Some(y) = self.baseline.as_mut() {
                    *y += dy;
                }
            }
            "Tm" => {
                let y = operands.get(5).and_then(|o| o.as_float().ok());
                if y.is_none() || self.baseline != y {
                    self.new_line();
                }
                self.baseline = y;
            }
            "Tj" => self.push_fragment(operands.first(), encoding),
            "'" => {
                self.new_line();
                self.push_fragment(operands.first(), encoding);
            }
            "\"" => {
                self.new_line();
                self.push_fragment(operands.get(2), encoding);
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let mut fragment = String::new();
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                fragment.push_str(&decode(bytes, encoding));
                            }
                            Object::Integer(_) | Object::Real(_) => {
                                if item.as_float().is_ok_and(|gap| gap < WORD_GAP) {
                                    fragment.push(' ');
                                }
                            }
                            _ => {}
                        }
                    }
                    self.push_str(&fragment);
                }
            }
            _ => {}
        }
    }

    fn push_fragment(&mut self, operand: Option<&Object>, encoding: Option<&Encoding>) {
        if let Some(Object::String(bytes, _)) = operand {
            let fragment = decode(bytes, encoding);
            self.push_str(&fragment);
        }
    }

    fn push_str(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() && !self.text.ends_with(['\n', ' ']) && !fragment.starts_with(' ')
        {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    fn new_line(&mut self) {
        let end = self.text.trim_end_matches(' ').len();
        self.text.truncate(end);
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    fn finish(mut self) -> String {
        let end = self.text.trim_end().len();
        self.text.truncate(end);
        self.text
    }
}

fn decode(bytes: &[u8], encoding: Option<&Encoding>) -> String {
    let Some(encoding) = encoding else {
        log::warn!("Text shown without a decodable font, skipping");
        return String::new();
    };

    Document::decode_text(encoding, bytes).unwrap_or_else(|e| {
        log::warn!("Could not decode text fragment: {}", e);
        String::new()
    })
}
