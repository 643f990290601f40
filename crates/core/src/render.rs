//! Result rendering.
//!
//! Renderers are pure functions of the match results: one block per
//! extracted name, in document order.

use crate::types::{MatchResult, StatusClass};

/// Message shown when the document yielded no patient names.
pub const NO_PATIENTS_MESSAGE: &str = "No patient names were found in the document.";

/// Turns match results into display output.
pub trait ResultRenderer {
    fn render(&self, results: &[MatchResult]) -> String;
}

/// Markup for the result panel of the status page.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    /// Markup placed between result blocks.
    divider: String,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self {
            divider: r#"<hr class="my-2">"#.to_string(),
        }
    }
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_divider(mut self, divider: impl Into<String>) -> Self {
        self.divider = divider.into();
        self
    }

    fn block(name: &str, class: StatusClass) -> String {
        format!(
            r#"<div class="patient {}">{} </div>"#,
            class.css_class(),
            escape_html(name)
        )
    }
}

impl ResultRenderer for HtmlRenderer {
    /// # Example output
    /// ```text
    /// <div class="patient text-success">Maria Silva Santos </div><hr class="my-2"><div class="patient text-warning">Joao </div>
    /// ```
    fn render(&self, results: &[MatchResult]) -> String {
        if results.is_empty() {
            return Self::block(NO_PATIENTS_MESSAGE, StatusClass::Warning);
        }

        results
            .iter()
            .map(|r| Self::block(&r.name, r.class()))
            .collect::<Vec<_>>()
            .join(&self.divider)
    }
}

/// Plain-text table for terminals: `STATUS<TAB>name` per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ResultRenderer for TextRenderer {
    fn render(&self, results: &[MatchResult]) -> String {
        if results.is_empty() {
            return format!("{}\n", NO_PATIENTS_MESSAGE);
        }

        results
            .iter()
            .map(|r| format!("{}\t{}\n", r.status, r.name))
            .collect()
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
