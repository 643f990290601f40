//! Patient name extraction from document text.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::DEFAULT_PATTERN;
use crate::error::{Error, Result};
use crate::normalize::NameNormalizer;

/// Capture group holding the patient name.
const NAME_GROUP: &str = "name";

/// Compiled default appointment-sheet pattern.
static DEFAULT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(DEFAULT_PATTERN).unwrap());

/// Pulls patient names out of concatenated document text.
#[derive(Debug, Clone)]
pub struct NameExtractor {
    pattern: Regex,
    normalize_output: bool,
}

impl NameExtractor {
    /// Build an extractor from a pattern with a named group `name`.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::InvalidPattern(e.to_string()))?;

        if !regex.capture_names().flatten().any(|n| n == NAME_GROUP) {
            return Err(Error::InvalidPattern(format!(
                "pattern has no named group '{}'",
                NAME_GROUP
            )));
        }

        Ok(Self {
            pattern: regex,
            normalize_output: false,
        })
    }

    /// Also normalize each extracted name (uppercase, no accents).
    pub fn with_normalized_output(mut self, normalize: bool) -> Self {
        self.normalize_output = normalize;
        self
    }

    /// Extract all names in document order.
    ///
    /// Duplicates are kept. Text without any match yields an empty list.
    pub fn extract_names(&self, text: &str) -> Vec<String> {
        let normalizer = NameNormalizer::new();

        let names: Vec<String> = self
            .pattern
            .captures_iter(text)
            .filter_map(|caps| caps.name(NAME_GROUP))
            .map(|m| m.as_str().trim())
            .filter(|name| !name.is_empty())
            .map(|name| {
                if self.normalize_output {
                    normalizer.normalize(name)
                } else {
                    name.to_string()
                }
            })
            .collect();

        log::debug!("Extracted {} patient names", names.len());
        names
    }
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_REGEX.clone(),
            normalize_output: false,
        }
    }
}
