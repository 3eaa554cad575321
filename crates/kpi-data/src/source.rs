//! Raw tabular sources: delimited text and spreadsheet workbooks.
//!
//! Both kinds are read into a [`RawTable`] of loosely typed [`Cell`]s so the
//! store loader has a single normalisation path regardless of origin.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use tracing::debug;

use crate::error::DataFormatError;

// ── Cell / RawTable ───────────────────────────────────────────────────────────

/// One loosely typed cell as delivered by the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Render the cell as text. Integral numbers print without a fraction so
    /// a numeric id cell `42.0` reads back as `"42"`.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            Cell::Number(v) => v.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// One data row and the 1-based source line it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub cells: Vec<Cell>,
}

/// A header row plus the non-blank data rows.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ── Source kind ───────────────────────────────────────────────────────────────

/// How a source file is decoded, chosen from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Workbook,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Result<Self, DataFormatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" | "tsv" => Ok(SourceKind::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceKind::Workbook),
            _ => Err(DataFormatError::UnsupportedSource(path.to_path_buf())),
        }
    }
}

/// Read `path` into a [`RawTable`]. `sheet` only applies to workbooks.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<RawTable, DataFormatError> {
    let kind = SourceKind::from_path(path)?;
    let file_read = |source| DataFormatError::FileRead {
        path: path.to_path_buf(),
        source,
    };
    match kind {
        SourceKind::Csv => {
            let file = std::fs::File::open(path).map_err(file_read)?;
            read_csv(std::io::BufReader::new(file))
        }
        SourceKind::Workbook => {
            std::fs::metadata(path).map_err(file_read)?;
            read_workbook(path, sheet)
        }
    }
}

// ── Delimited text ────────────────────────────────────────────────────────────

/// Pick `;`, tab or `,` from whichever is most frequent on the header line.
fn detect_delimiter(header_line: &str) -> u8 {
    let candidates = [b';', b'\t', b','];
    candidates
        .into_iter()
        .max_by_key(|&d| (header_line.matches(d as char).count(), d == b','))
        .filter(|&d| header_line.contains(d as char))
        .unwrap_or(b',')
}

/// UTF-8 when valid, otherwise Latin-1, which covers the accented letters of
/// Windows-1252 exports.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!(
                "source is not UTF-8 (invalid byte at {}); decoding as Latin-1",
                e.utf8_error().valid_up_to()
            );
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

/// Read a delimited-text table from any reader.
pub fn read_csv<R: Read>(mut reader: R) -> Result<RawTable, DataFormatError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(csv::Error::from)?;
    let content = decode(bytes);
    let content = content.trim_start_matches('\u{feff}');

    let header_line = content.lines().next().unwrap_or_default();
    let delimiter = detect_delimiter(header_line);
    debug!("csv delimiter detected: {:?}", delimiter as char);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(DataFormatError::EmptySource);
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| record_line(content, p))
            .unwrap_or(i + 2);
        let cells: Vec<Cell> = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(RawRow { line, cells });
    }

    Ok(finish(headers, rows))
}

/// Source line a record starts on. The reader stamps the position before
/// skipping empty lines, so step over those first.
fn record_line(content: &str, position: &csv::Position) -> usize {
    let skipped = content
        .as_bytes()
        .get(position.byte() as usize..)
        .unwrap_or_default()
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .filter(|&&b| b == b'\n')
        .count();
    position.line() as usize + skipped
}

// ── Workbooks ─────────────────────────────────────────────────────────────────

/// Read one worksheet of a workbook; the first sheet when `sheet` is `None`.
pub fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable, DataFormatError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();

    let name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| DataFormatError::WorksheetNotFound(wanted.to_string()))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| DataFormatError::WorksheetNotFound(path.display().to_string()))?,
    };
    debug!("reading worksheet '{}' from {}", name, path.display());

    let range = workbook.worksheet_range(&name)?;
    let mut row_iter = range.rows();

    let headers: Vec<String> = match row_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| convert_cell(c).to_text().trim().to_string())
            .collect(),
        None => return Err(DataFormatError::EmptySource),
    };

    // Header on the first used row; data starts one line below.
    let first_line = range.start().map(|(row, _)| row as usize + 2).unwrap_or(2);
    let rows = row_iter
        .enumerate()
        .map(|(i, r)| RawRow {
            line: first_line + i,
            cells: r.iter().map(convert_cell).collect(),
        })
        .collect();

    Ok(finish(headers, rows))
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Cell::Date(naive.date()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Drop rows where every cell is blank.
fn finish(headers: Vec<String>, rows: Vec<RawRow>) -> RawTable {
    let rows = rows
        .into_iter()
        .filter(|row| !row.cells.iter().all(Cell::is_blank))
        .collect();
    RawTable { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_source_kind_from_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a.CSV")).unwrap(), SourceKind::Csv);
        assert_eq!(
            SourceKind::from_path(Path::new("data_kpi.xlsx")).unwrap(),
            SourceKind::Workbook
        );
        assert!(matches!(
            SourceKind::from_path(Path::new("a.parquet")),
            Err(DataFormatError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("a,b,c"), b',');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn test_read_csv_semicolon_with_decimal_commas() {
        let input = "ID;Montant\n1;12,50\n2;\n";
        let table = read_csv(input.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["ID", "Montant"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells[1], Cell::Text("12,50".to_string()));
        assert_eq!(table.rows[1].cells[1], Cell::Empty);
    }

    #[test]
    fn test_read_csv_skips_blank_rows_and_bom() {
        let input = "\u{feff}a,b\n1,2\n,\n3,4\n";
        let table = read_csv(input.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_read_csv_empty_input() {
        assert!(matches!(
            read_csv("".as_bytes()),
            Err(DataFormatError::EmptySource)
        ));
    }

    #[test]
    fn test_read_table_missing_file() {
        let err = read_table(&PathBuf::from("/tmp/kpi-missing-source.csv"), None).unwrap_err();
        assert!(matches!(err, DataFormatError::FileRead { .. }));
    }

    #[test]
    fn test_cell_to_text() {
        assert_eq!(Cell::Number(42.0).to_text(), "42");
        assert_eq!(Cell::Number(4.5).to_text(), "4.5");
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).to_text(),
            "2024-01-02"
        );
    }

    #[test]
    fn test_read_csv_keeps_source_lines_across_blank_rows() {
        let input = "a,b\n1,2\n,\n\n3,4\n";
        let table = read_csv(input.as_bytes()).unwrap();
        let lines: Vec<usize> = table.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 5]);
    }

    #[test]
    fn test_read_csv_decodes_latin1() {
        let input = b"Cat\xe9gorie;Mode\nBoissons;Esp\xe8ces\n";
        let table = read_csv(&input[..]).unwrap();
        assert_eq!(table.headers, vec!["Catégorie", "Mode"]);
        assert_eq!(table.rows[0].cells[1], Cell::Text("Espèces".to_string()));
    }

    // ── workbooks ─────────────────────────────────────────────────────────────

    fn write_workbook(dir: &Path) -> PathBuf {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let path = dir.join("data_kpi.xlsx");
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let mut wb = Workbook::new();

        let notes = wb.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write(0, 0, "Commentaire").unwrap();

        let ventes = wb.add_worksheet();
        ventes.set_name("Ventes").unwrap();
        for (col, header) in ["ID_Transaction", "Date_Transaction", "Montant", "ID_Client"]
            .into_iter()
            .enumerate()
        {
            ventes.write(0, col as u16, header).unwrap();
        }
        ventes.write(1, 0, "T1").unwrap();
        let date = ExcelDateTime::from_ymd(2024, 3, 15).unwrap();
        ventes.write_datetime_with_format(1, 1, &date, &date_format).unwrap();
        ventes.write(1, 2, 12.5).unwrap();
        ventes.write(1, 3, 7).unwrap();
        // Row 3 left empty.
        ventes.write(3, 0, "T2").unwrap();
        ventes.write(3, 1, "16/03/2024").unwrap();

        wb.save(&path).unwrap();
        path
    }

    #[test]
    fn test_read_workbook_named_sheet_typed_cells() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_workbook(tmp.path());

        let table = read_table(&path, Some("Ventes")).unwrap();
        assert_eq!(
            table.headers,
            vec!["ID_Transaction", "Date_Transaction", "Montant", "ID_Client"]
        );
        assert_eq!(table.rows.len(), 2);

        let first = &table.rows[0];
        assert_eq!(first.line, 2);
        assert_eq!(first.cells[0], Cell::Text("T1".to_string()));
        assert_eq!(
            first.cells[1],
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(first.cells[2], Cell::Number(12.5));
        assert_eq!(first.cells[3], Cell::Number(7.0));

        assert_eq!(table.rows[1].line, 4);
        assert_eq!(table.rows[1].cells[1], Cell::Text("16/03/2024".to_string()));
    }

    #[test]
    fn test_read_workbook_defaults_to_first_sheet() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_workbook(tmp.path());

        let table = read_table(&path, None).unwrap();
        assert_eq!(table.headers, vec!["Commentaire"]);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_read_workbook_missing_sheet() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_workbook(tmp.path());

        let err = read_table(&path, Some("Absent")).unwrap_err();
        assert!(matches!(err, DataFormatError::WorksheetNotFound(name) if name == "Absent"));
    }

    #[test]
    fn test_convert_cell_numbers() {
        assert_eq!(convert_cell(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(convert_cell(&Data::Float(2.5)), Cell::Number(2.5));
        assert_eq!(convert_cell(&Data::Bool(true)), Cell::Text("true".to_string()));
        assert_eq!(convert_cell(&Data::Empty), Cell::Empty);
    }
}
