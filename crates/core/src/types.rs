//! Domain types for roster records and match results.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::RosterColumns;
use crate::error::{Error, Result};
use crate::normalize::NameNormalizer;

/// Status value meaning the patient is actively enrolled.
pub const ACTIVE: &str = "ATIVO";

/// Status value meaning the patient is no longer enrolled.
pub const INACTIVE: &str = "INATIVO";

/// Status label shown for names with no roster entry.
pub const NOT_FOUND: &str = "not found";

/// One row of the roster spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRecord {
    /// Full patient name as recorded (`nome` column).
    pub name: String,

    /// Raw enrollment status (`situacao` column).
    pub status: String,

    /// Every other column of the row, keyed by header.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl RosterRecord {
    /// Create a record with only a name and a status.
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an unused pass-through column.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// The roster spreadsheet, in sheet row order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    pub records: Vec<RosterRecord>,
}

impl Roster {
    pub fn new(records: Vec<RosterRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RosterRecord> {
        self.records.iter()
    }

    /// Build a roster from a sheet's header row and data rows.
    ///
    /// Blank rows are skipped. Cells missing at the end of a short row read
    /// as empty. The name and status columns are located by exact header
    /// text first, then ignoring case and accents.
    pub fn from_rows(
        headers: &[String],
        rows: impl IntoIterator<Item = Vec<String>>,
        columns: &RosterColumns,
    ) -> Result<Self> {
        let name_idx = find_column(headers, &columns.name)
            .ok_or_else(|| Error::MissingColumn(columns.name.clone()))?;
        let status_idx = find_column(headers, &columns.status)
            .ok_or_else(|| Error::MissingColumn(columns.status.clone()))?;

        let mut records = Vec::new();

        for row in rows {
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let cell = |idx: usize| row.get(idx).cloned().unwrap_or_default();
            let mut record = RosterRecord::new(cell(name_idx), cell(status_idx));

            for (idx, header) in headers.iter().enumerate() {
                let header = header.trim();
                if idx == name_idx || idx == status_idx || header.is_empty() {
                    continue;
                }
                let value = cell(idx);
                if !value.is_empty() {
                    record.extra.entry(header.to_string()).or_insert(value);
                }
            }

            records.push(record);
        }

        log::debug!("Loaded {} roster records", records.len());
        Ok(Self::new(records))
    }
}

fn find_column(headers: &[String], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    headers
        .iter()
        .position(|h| h.trim() == wanted)
        .or_else(|| {
            let normalizer = NameNormalizer::new();
            let wanted = normalizer.normalize(wanted);
            headers
                .iter()
                .position(|h| normalizer.normalize_trimmed(h) == wanted)
        })
}

impl From<Vec<RosterRecord>> for Roster {
    fn from(records: Vec<RosterRecord>) -> Self {
        Self::new(records)
    }
}

/// Resolved enrollment status for an extracted name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    /// "ATIVO".
    Active,
    /// "INATIVO".
    Inactive,
    /// Any other status recorded in the roster, trimmed.
    Other(String),
    /// No roster record matched.
    NotFound,
}

impl MatchStatus {
    /// Classify a raw roster status value.
    ///
    /// Comparison ignores case, accents and surrounding whitespace.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match NameNormalizer::new().normalize(trimmed).as_str() {
            ACTIVE => Self::Active,
            INACTIVE => Self::Inactive,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => ACTIVE,
            Self::Inactive => INACTIVE,
            Self::Other(raw) => raw,
            Self::NotFound => NOT_FOUND,
        }
    }

    pub fn class(&self) -> StatusClass {
        match self {
            Self::Active => StatusClass::Positive,
            Self::Inactive => StatusClass::Negative,
            Self::Other(_) | Self::NotFound => StatusClass::Warning,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MatchStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Display classification of a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Positive,
    Negative,
    Warning,
}

impl StatusClass {
    /// CSS class used by the result page.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Positive => "text-success",
            Self::Negative => "text-danger",
            Self::Warning => "text-warning",
        }
    }
}

/// The outcome of matching one extracted name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// The name as captured from the document.
    pub extracted: String,

    /// Name to display: the roster's full name when matched, else `extracted`.
    pub name: String,

    pub status: MatchStatus,
}

impl MatchResult {
    pub fn found(extracted: impl Into<String>, name: impl Into<String>, status: MatchStatus) -> Self {
        Self {
            extracted: extracted.into(),
            name: name.into(),
            status,
        }
    }

    pub fn not_found(extracted: impl Into<String>) -> Self {
        let extracted = extracted.into();
        Self {
            name: extracted.clone(),
            extracted,
            status: MatchStatus::NotFound,
        }
    }

    pub fn class(&self) -> StatusClass {
        self.status.class()
    }
}

/// Input file kinds recognized from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// PDF document (`%PDF-`).
    Pdf,
    /// Office Open XML workbook (ZIP container).
    Xlsx,
    /// Legacy Excel 97-2003 workbook (OLE/CFB container).
    Xls,
    /// OpenDocument spreadsheet (ZIP container with a `mimetype` entry).
    Ods,
}

const ODS_MIMETYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";

impl DocumentKind {
    /// Detect the kind from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }

        // XLSX and ODS are ZIP files (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            if is_ods_container(bytes) {
                return Some(Self::Ods);
            }
            return Some(Self::Xlsx);
        }

        // XLS is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
            return Some(Self::Xls);
        }

        None
    }

    /// Detect the kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "ods" => Some(Self::Ods),
            _ => None,
        }
    }
}

/// ODF packages store an uncompressed `mimetype` entry first in the archive.
fn is_ods_container(bytes: &[u8]) -> bool {
    let field = |at: usize| {
        bytes
            .get(at..at + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
    };
    let (Some(name_len), Some(extra_len)) = (field(26), field(28)) else {
        return false;
    };

    let data_start = 30 + name_len + extra_len;
    bytes.get(30..30 + name_len) == Some(b"mimetype".as_slice())
        && bytes
            .get(data_start..)
            .is_some_and(|data| data.starts_with(ODS_MIMETYPE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_roster_from_rows() {
        let roster = Roster::from_rows(
            &headers(&["codigo", "nome", "situacao"]),
            vec![
                row(&["1", "Maria Silva Santos", "ATIVO"]),
                row(&["", "", ""]),
                row(&["2", "Carlos Souza"]),
            ],
            &RosterColumns::default(),
        )
        .unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(
            roster.records[0],
            RosterRecord::new("Maria Silva Santos", "ATIVO").with_extra("codigo", "1")
        );
        assert_eq!(roster.records[1].name, "Carlos Souza");
        assert_eq!(roster.records[1].status, "");
    }

    #[test]
    fn test_roster_header_lookup_ignores_case_and_accents() {
        let roster = Roster::from_rows(
            &headers(&[" Nome ", "Situação"]),
            vec![row(&["Ana Lima", "INATIVO"])],
            &RosterColumns::default(),
        )
        .unwrap();
        assert_eq!(roster.records[0], RosterRecord::new("Ana Lima", "INATIVO"));
    }

    #[test]
    fn test_roster_missing_column() {
        let err = Roster::from_rows(
            &headers(&["nome", "status"]),
            Vec::<Vec<String>>::new(),
            &RosterColumns::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(ref c) if c == "situacao"));
    }

    #[test]
    fn test_status_from_raw() {
        assert_eq!(MatchStatus::from_raw("ATIVO"), MatchStatus::Active);
        assert_eq!(MatchStatus::from_raw(" ativo "), MatchStatus::Active);
        assert_eq!(MatchStatus::from_raw("Inativo"), MatchStatus::Inactive);
        assert_eq!(
            MatchStatus::from_raw(" Em análise "),
            MatchStatus::Other("Em análise".to_string())
        );
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(MatchStatus::Active.class().css_class(), "text-success");
        assert_eq!(MatchStatus::Inactive.class().css_class(), "text-danger");
        assert_eq!(
            MatchStatus::Other("SUSPENSO".into()).class(),
            StatusClass::Warning
        );
        assert_eq!(MatchStatus::NotFound.class(), StatusClass::Warning);
    }

    #[test]
    fn test_match_result_serializes_status_as_string() {
        let result = MatchResult::found("Maria", "Maria Silva", MatchStatus::Active);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["name"], "Maria Silva");
        assert_eq!(json["status"], "ATIVO");

        let missing = MatchResult::not_found("Joao");
        let json = serde_json::to_value(&missing).unwrap();
        assert_eq!(json["name"], "Joao");
        assert_eq!(json["status"], "not found");
    }

    #[test]
    fn test_document_kind_from_magic() {
        assert_eq!(DocumentKind::from_magic(b"%PDF-1.7\n"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::from_magic(&[0x50, 0x4B, 0x03, 0x04, 0x14, 0x00]),
            Some(DocumentKind::Xlsx)
        );
        assert_eq!(
            DocumentKind::from_magic(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            Some(DocumentKind::Xls)
        );
        assert_eq!(DocumentKind::from_magic(b"nome,situacao"), None);

        let mut ods = vec![0x50, 0x4B, 0x03, 0x04];
        ods.extend_from_slice(&[0; 22]);
        ods.extend_from_slice(&8u16.to_le_bytes());
        ods.extend_from_slice(&0u16.to_le_bytes());
        ods.extend_from_slice(b"mimetype");
        ods.extend_from_slice(ODS_MIMETYPE);
        assert_eq!(DocumentKind::from_magic(&ods), Some(DocumentKind::Ods));
        assert_eq!(DocumentKind::from_magic(&ods[..40]), Some(DocumentKind::Xlsx));
        assert_eq!(DocumentKind::from_magic(b""), None);
    }

    #[test]
    fn test_document_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("xlsx"), Some(DocumentKind::Xlsx));
        assert_eq!(DocumentKind::from_extension("csv"), None);
    }
}
