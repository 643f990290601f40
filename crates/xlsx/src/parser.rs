//! XLSX workbook parser implementation.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use roster_core::{DocumentKind, Error, Result, Roster, RosterColumns, RosterParser};
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

use crate::workbook;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Columns in a worksheet (A through XFD).
const MAX_COLUMNS: usize = 16_384;

/// Cell contents of one worksheet, header row first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parser for roster workbooks.
///
/// XLSX is read directly from the OOXML package; legacy .xls and OpenDocument
/// .ods workbooks go through calamine.
pub struct XlsxParser;

impl XlsxParser {
    /// Create a new XLSX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse the first worksheet of a workbook into a roster.
    pub fn parse<R: Read + Seek>(&self, reader: R, columns: &RosterColumns) -> Result<Roster> {
        self.roster_from_table(self.read_first_sheet(reader)?, columns)
    }

    fn roster_from_table(&self, table: SheetTable, columns: &RosterColumns) -> Result<Roster> {
        log::debug!(
            "First sheet: {} header cells, {} data rows",
            table.headers.len(),
            table.rows.len()
        );

        if table.headers.iter().all(|h| h.trim().is_empty()) {
            return Err(Error::SheetParseError(
                "first sheet has no header row".to_string(),
            ));
        }

        Roster::from_rows(&table.headers, table.rows, columns)
    }

    /// Read the cell text of the first worksheet.
    pub fn read_first_sheet<R: Read + Seek>(&self, reader: R) -> Result<SheetTable> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let sheet_path = self.get_first_sheet_path(&mut archive)?;
        log::debug!("Reading worksheet {}", sheet_path);

        let shared_strings = if archive.file_names().any(|name| name == SHARED_STRINGS_PATH) {
            let content = self.read_file_from_archive(&mut archive, SHARED_STRINGS_PATH)?;
            parse_shared_strings(&content)?
        } else {
            Vec::new()
        };

        let content = self.read_file_from_archive(&mut archive, &sheet_path)?;
        let mut rows = parse_sheet_rows(&content, &shared_strings)?.into_iter();

        Ok(SheetTable {
            headers: rows.next().unwrap_or_default(),
            rows: rows.collect(),
        })
    }

    /// Resolve the path of the first sheet listed in the workbook.
    fn get_first_sheet_path<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<String> {
        let workbook = self.read_file_from_archive(archive, WORKBOOK_PATH)?;

        let Some(rel_id) = first_sheet_rel_id(&workbook)? else {
            log::warn!("Workbook lists no sheets, falling back to {}", DEFAULT_SHEET_PATH);
            return Ok(DEFAULT_SHEET_PATH.to_string());
        };

        let rels = match self.read_file_from_archive(archive, WORKBOOK_RELS_PATH) {
            Ok(rels) => rels,
            Err(e) => {
                log::warn!("{} (continuing with {})", e, DEFAULT_SHEET_PATH);
                return Ok(DEFAULT_SHEET_PATH.to_string());
            }
        };

        match relationship_target(&rels, &rel_id)? {
            Some(target) => Ok(resolve_target(&target)),
            None => {
                log::warn!(
                    "Relationship {} not found, falling back to {}",
                    rel_id,
                    DEFAULT_SHEET_PATH
                );
                Ok(DEFAULT_SHEET_PATH.to_string())
            }
        }
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for XlsxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterParser for XlsxParser {
    fn parse_roster(&self, bytes: &[u8], columns: &RosterColumns) -> Result<Roster> {
        match DocumentKind::from_magic(bytes) {
            Some(DocumentKind::Xlsx) => self.parse(Cursor::new(bytes), columns),
            Some(DocumentKind::Xls) | Some(DocumentKind::Ods) => {
                self.roster_from_table(workbook::read_first_sheet(bytes)?, columns)
            }
            _ => Err(Error::UnsupportedFormat(
                "roster is not an .xlsx, .xls or .ods workbook".to_string(),
            )),
        }
    }
}

/// The `r:id` of the first `<sheet>` in workbook.xml.
fn first_sheet_rel_id(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sheet" =>
            {
                // The attribute is namespaced (`r:id`) but the prefix varies.
                return Ok(attribute(e, b"id"));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing workbook: {}", e)));
            }
            _ => {}
        }
    }
}

/// The `Target` of the relationship with the given `Id`.
fn relationship_target(xml: &str, rel_id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                if attribute(e, b"Id").as_deref() == Some(rel_id) {
                    return Ok(attribute(e, b"Target"));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }
}

/// Turn a relationship target into an archive path.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("xl/{}", target)
    }
}

/// Read the shared string table, one entry per `<si>`.
///
/// Rich-text runs are concatenated; phonetic hints (`<rPh>`) are skipped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => current.clear(),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if local_name(e.name().as_ref()) == b"si" {
                    strings.push(String::new());
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text && !in_phonetic {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::XmlError(format!("Bad shared string: {}", e)))?;
                    current.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing shared strings: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// Cell currently being read.
#[derive(Debug, Default)]
struct CellInfo {
    reference: Option<String>,
    kind: Option<String>,
    text: String,
}

/// Read every `<row>` of a worksheet as dense cell text.
fn parse_sheet_rows(xml: &str, shared_strings: &[String]) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut current_row: Option<Vec<String>> = None;
    let mut current_cell: Option<CellInfo> = None;
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"row" => current_row = Some(Vec::new()),
                b"c" => {
                    current_cell = Some(CellInfo {
                        reference: attribute(e, b"r"),
                        kind: attribute(e, b"t"),
                        text: String::new(),
                    });
                }
                // `<v>` holds the value; `<t>` inside `<is>` holds inline strings.
                b"v" | b"t" if current_cell.is_some() => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if local_name(e.name().as_ref()) == b"row" {
                    rows.push(Vec::new());
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_value {
                    if let Some(ref mut cell) = current_cell {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::XmlError(format!("Bad cell text: {}", e)))?;
                        cell.text.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let (Some(cell), Some(row)) = (current_cell.take(), current_row.as_mut()) {
                        let column = match cell.reference.as_deref() {
                            Some(reference) => column_index(reference).ok_or_else(|| {
                                Error::SheetParseError(format!(
                                    "Invalid cell reference '{}'",
                                    reference
                                ))
                            })?,
                            None => row.len(),
                        };
                        let value = cell_value(&cell, shared_strings);
                        if row.len() <= column {
                            row.resize(column + 1, String::new());
                        }
                        row[column] = value;
                    }
                }
                b"row" => {
                    if let Some(row) = current_row.take() {
                        rows.push(row);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing worksheet: {}", e)));
            }
            _ => {}
        }
    }

    Ok(rows)
}

/// Resolve a cell's text according to its type attribute.
fn cell_value(cell: &CellInfo, shared_strings: &[String]) -> String {
    match cell.kind.as_deref() {
        Some("s") => match cell.text.trim().parse::<usize>() {
            Ok(idx) => shared_strings.get(idx).cloned().unwrap_or_else(|| {
                log::warn!("Shared string index {} out of range", idx);
                String::new()
            }),
            Err(_) => {
                log::warn!("Invalid shared string index '{}'", cell.text);
                String::new()
            }
        },
        Some("b") => match cell.text.trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        _ => cell.text.clone(),
    }
}

/// Zero-based column index of a cell reference like "C7" or "AB12".
///
/// `None` when the reference has no column letters or lies past column XFD.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();

    if letters.is_empty() {
        return None;
    }

    let number = letters.iter().try_fold(0usize, |acc, &b| {
        acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)
    })?;

    (number <= MAX_COLUMNS).then(|| number - 1)
}

/// Value of the attribute whose local name is `key`.
fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Pacientes" sheetId="2" r:id="rId7"/>
    <sheet name="Antigos" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="7" uniqueCount="7">
  <si><t>nome</t></si>
  <si><t>situacao</t></si>
  <si><t>Maria Silva Santos</t></si>
  <si><t>ATIVO</t></si>
  <si><r><t xml:space="preserve">José </t></r><r><rPr><b/></rPr><t>Conceição</t></r><rPh><t>ignored</t></rPh></si>
  <si><t>INATIVO</t></si>
  <si/>
</sst>"#;

    const PATIENT_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>codigo</t></is></c></row>
    <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2" t="s"><v>3</v></c><c r="C2"><v>1024</v></c></row>
    <row r="3"/>
    <row r="4"><c r="A4" t="s"><v>4</v></c><c r="C4"><v>77</v></c><c r="B4" t="s"><v>5</v></c></row>
    <row r="5"><c r="B5" t="str"><v>ATIVO</v></c></row>
  </sheetData>
</worksheet>"#;

    const OLD_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="inlineStr"><is><t>wrong sheet</t></is></c></row>
  </sheetData>
</worksheet>"#;

    fn build_xlsx(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (path, content) in files {
            writer.start_file(*path, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn roster_workbook() -> Vec<u8> {
        build_xlsx(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", OLD_SHEET),
            ("xl/worksheets/sheet2.xml", PATIENT_SHEET),
        ])
    }

    #[test]
    fn test_reads_first_listed_sheet() {
        let table = XlsxParser::new()
            .read_first_sheet(Cursor::new(roster_workbook()))
            .unwrap();

        assert_eq!(table.headers, vec!["nome", "situacao", "codigo"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0], vec!["Maria Silva Santos", "ATIVO", "1024"]);
        assert!(table.rows[1].is_empty());
        assert_eq!(table.rows[2], vec!["José Conceição", "INATIVO", "77"]);
        assert_eq!(table.rows[3], vec!["", "ATIVO"]);
    }

    #[test]
    fn test_parse_roster() {
        let roster = XlsxParser::new()
            .parse_roster(&roster_workbook(), &RosterColumns::default())
            .unwrap();

        assert_eq!(roster.len(), 3);
        assert_eq!(roster.records[0].name, "Maria Silva Santos");
        assert_eq!(roster.records[0].status, "ATIVO");
        assert_eq!(roster.records[0].extra.get("codigo").map(String::as_str), Some("1024"));
        assert_eq!(roster.records[1].name, "José Conceição");
        assert_eq!(roster.records[1].status, "INATIVO");
        assert_eq!(roster.records[2].name, "");
    }

    #[test]
    fn test_falls_back_to_sheet1_without_rels() {
        let bytes = build_xlsx(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/worksheets/sheet1.xml", OLD_SHEET),
        ]);
        let table = XlsxParser::new().read_first_sheet(Cursor::new(bytes)).unwrap();
        assert_eq!(table.headers, vec!["wrong sheet"]);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_missing_status_column() {
        let bytes = build_xlsx(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet2.xml", OLD_SHEET),
        ]);
        let err = XlsxParser::new()
            .parse_roster(&bytes, &RosterColumns::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(_)));
    }

    #[test]
    fn test_empty_sheet() {
        let bytes = build_xlsx(&[(
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData/></worksheet>"#,
        )]);
        let err = XlsxParser::new()
            .parse(Cursor::new(bytes), &RosterColumns::default())
            .unwrap_err();
        assert!(matches!(err, Error::ZipError(_)));

        let bytes = build_xlsx(&[
            ("xl/workbook.xml", "<workbook><sheets/></workbook>"),
            ("xl/worksheets/sheet1.xml", r#"<worksheet><sheetData/></worksheet>"#),
        ]);
        let err = XlsxParser::new()
            .parse(Cursor::new(bytes), &RosterColumns::default())
            .unwrap_err();
        assert!(matches!(err, Error::SheetParseError(_)));
    }

    #[test]
    fn test_truncated_xls_is_a_parse_failure() {
        let bytes = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0];
        let err = XlsxParser::new()
            .parse_roster(&bytes, &RosterColumns::default())
            .unwrap_err();
        assert!(matches!(err, Error::SheetParseError(_)));
    }

    #[test]
    fn test_overlong_cell_reference() {
        for reference in ["ZZZZZZZZZZZZZZZ2", "XFE2", "AAAAAAA2"] {
            let sheet = format!(
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>nome</t></is></c><c r="B1" t="inlineStr"><is><t>situacao</t></is></c></row><row r="2"><c r="{}"><v>1</v></c></row></sheetData></worksheet>"#,
                reference
            );
            let bytes = build_xlsx(&[
                ("xl/workbook.xml", "<workbook><sheets/></workbook>"),
                ("xl/worksheets/sheet1.xml", sheet.as_str()),
            ]);

            let err = XlsxParser::new()
                .parse_roster(&bytes, &RosterColumns::default())
                .unwrap_err();
            assert!(matches!(err, Error::SheetParseError(ref m) if m.contains(reference)));
            assert!(err.is_parse_failure());
        }
    }

    #[test]
    fn test_rejects_non_workbook() {
        let err = XlsxParser::new()
            .parse_roster(b"%PDF-1.4 not a sheet", &RosterColumns::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_corrupt_zip() {
        let bytes = [0x50, 0x4B, 0x03, 0x04, 0xFF, 0xFF, 0x00];
        let err = XlsxParser::new()
            .parse_roster(&bytes, &RosterColumns::default())
            .unwrap_err();
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("C7"), Some(2));
        assert_eq!(column_index("Z3"), Some(25));
        assert_eq!(column_index("AA10"), Some(26));
        assert_eq!(column_index("ab12"), Some(27));
        assert_eq!(column_index("XFD1"), Some(16_383));
        assert_eq!(column_index("XFE1"), None);
        assert_eq!(column_index("ZZZZZZZZZZZZZZZZZZZZ1"), None);
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"x:row"), b"row");
        assert_eq!(local_name(b"r:id"), b"id");
        assert_eq!(local_name(b"c"), b"c");
    }
}
