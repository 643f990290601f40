//! Name normalization for roster comparison.
//!
//! Folds case and strips accents so that names typed into the roster and
//! names printed on the appointment sheet compare equal when they differ only
//! in diacritics or capitalization. Whitespace is left untouched; callers trim.

use unicode_normalization::UnicodeNormalization;

/// Combining diacritical marks block stripped after decomposition.
const COMBINING_MARKS: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036F}';

/// Canonicalizes names for comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameNormalizer;

impl NameNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a name: uppercase, decompose, drop combining marks.
    ///
    /// Uppercasing runs before decomposition so that characters whose
    /// uppercase form carries a combining mark are stripped as well, which
    /// keeps the function idempotent.
    pub fn normalize(&self, text: &str) -> String {
        text.chars()
            .map(|c| match c {
                'ç' => 'c',
                'Ç' => 'C',
                other => other,
            })
            .flat_map(char::to_uppercase)
            .nfd()
            .filter(|c| !COMBINING_MARKS.contains(c))
            .collect()
    }

    /// Normalize after trimming surrounding whitespace.
    pub fn normalize_trimmed(&self, text: &str) -> String {
        self.normalize(text.trim())
    }
}

/// Shorthand for [`NameNormalizer::normalize`].
pub fn normalize(text: &str) -> String {
    NameNormalizer::new().normalize(text)
}
