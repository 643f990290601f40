//! Matching extracted names against the roster.
//!
//! Two policies exist. [`MatchPolicy::Substring`] is the default: a roster
//! record matches when its normalized name contains the normalized extracted
//! name, and an active record anywhere among the matches wins. This tolerates
//! appointment sheets that print only part of a patient's name.
//! [`MatchPolicy::Exact`] is the older behaviour: case-insensitive equality of
//! the trimmed names, accents significant.

use serde::{Deserialize, Serialize};

use crate::normalize::NameNormalizer;
use crate::types::{MatchResult, MatchStatus, Roster, RosterRecord, ACTIVE};

/// How an extracted name is compared with roster names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Accent- and case-insensitive containment, active status preferred.
    #[default]
    Substring,
    /// Case-insensitive equality of trimmed names.
    Exact,
}

/// Resolves a status for each extracted name.
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    policy: MatchPolicy,
    normalizer: NameNormalizer,
}

impl NameMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            normalizer: NameNormalizer::new(),
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Resolve one extracted name into a display name and status.
    pub fn resolve(&self, extracted: &str, roster: &Roster) -> MatchResult {
        match self.policy {
            MatchPolicy::Substring => self.resolve_substring(extracted, roster),
            MatchPolicy::Exact => self.resolve_exact(extracted, roster),
        }
    }

    /// Resolve only the status of one extracted name.
    pub fn resolve_status(&self, extracted: &str, roster: &Roster) -> MatchStatus {
        self.resolve(extracted, roster).status
    }

    /// Resolve every extracted name, keeping document order.
    pub fn resolve_all(&self, names: &[String], roster: &Roster) -> Vec<MatchResult> {
        let results: Vec<MatchResult> = names
            .iter()
            .map(|name| self.resolve(name, roster))
            .collect();

        log::debug!(
            "Matched {} of {} names against {} roster records",
            results.iter().filter(|r| r.status.is_found()).count(),
            results.len(),
            roster.len()
        );

        results
    }

    fn resolve_substring(&self, extracted: &str, roster: &Roster) -> MatchResult {
        let needle = self.normalizer.normalize_trimmed(extracted);
        if needle.is_empty() {
            return MatchResult::not_found(extracted);
        }

        let matches: Vec<&RosterRecord> = roster
            .iter()
            .filter(|record| self.normalizer.normalize_trimmed(&record.name).contains(&needle))
            .collect();

        let Some(first) = matches.first() else {
            return MatchResult::not_found(extracted);
        };

        let any_active = matches
            .iter()
            .any(|record| self.normalizer.normalize_trimmed(&record.status) == ACTIVE);

        let status = if any_active {
            MatchStatus::Active
        } else {
            MatchStatus::from_raw(&first.status)
        };

        MatchResult::found(extracted, first.name.trim(), status)
    }

    fn resolve_exact(&self, extracted: &str, roster: &Roster) -> MatchResult {
        let wanted = extracted.trim().to_uppercase();
        if wanted.is_empty() {
            return MatchResult::not_found(extracted);
        }

        roster
            .iter()
            .find(|record| record.name.trim().to_uppercase() == wanted)
            .map(|record| {
                MatchResult::found(extracted, record.name.trim(), MatchStatus::from_raw(&record.status))
            })
            .unwrap_or_else(|| MatchResult::not_found(extracted))
    }
}
