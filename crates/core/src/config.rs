//! Check configuration.

use serde::{Deserialize, Serialize};

use crate::matcher::MatchPolicy;

/// Default pattern for appointment sheets: `Paciente: <id> - <name>`.
///
/// The identifier run (digits, whitespace, periods) is discarded; the name is
/// a run of letters (with any combining marks) and horizontal whitespace and
/// never crosses a line break.
pub const DEFAULT_PATTERN: &str =
    r"Paciente:\s*[\d\s.]+-[ \t]*(?P<name>\p{L}\p{M}*[\p{L}\p{M} \t]*)";

/// Header of the roster column holding the full name.
pub const DEFAULT_NAME_COLUMN: &str = "nome";

/// Header of the roster column holding the enrollment status.
pub const DEFAULT_STATUS_COLUMN: &str = "situacao";

/// Roster column headers used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterColumns {
    pub name: String,
    pub status: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME_COLUMN.to_string(),
            status: DEFAULT_STATUS_COLUMN.to_string(),
        }
    }
}

/// Settings for one status check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Extraction regex; must contain a named group `name`.
    pub pattern: String,

    /// Normalize names as they are extracted.
    pub normalize_extracted: bool,

    pub policy: MatchPolicy,

    pub columns: RosterColumns,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            normalize_extracted: false,
            policy: MatchPolicy::default(),
            columns: RosterColumns::default(),
        }
    }
}

impl CheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_normalize_extracted(mut self, normalize: bool) -> Self {
        self.normalize_extracted = normalize;
        self
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_name_column(mut self, column: impl Into<String>) -> Self {
        self.columns.name = column.into();
        self
    }

    pub fn with_status_column(mut self, column: impl Into<String>) -> Self {
        self.columns.status = column.into();
        self
    }
}
