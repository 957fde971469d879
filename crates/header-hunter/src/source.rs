//! Tabular sources: workbooks of sheets of text cells

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, warn};

use crate::SourceError;

/// One sheet as ordered rows of cell text. Blank cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Build a sheet from anything that yields rows of cell values
    pub fn new<R, C>(name: &str, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            name: name.to_string(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Cell text at (row, col), empty when out of range
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Whether every cell of the row is blank
    pub fn is_blank_row(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map_or(true, |r| r.iter().all(|c| c.trim().is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        (0..self.rows.len()).all(|row| self.is_blank_row(row))
    }
}

/// A spreadsheet-like source with one or more sheets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    /// File or session name
    pub label: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(label: &str, sheets: Vec<Sheet>) -> Self {
        Self {
            label: label.to_string(),
            sheets,
        }
    }

    /// Open an xlsx/xls/xlsb/ods workbook or a delimited text file
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workbook")
            .to_string();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "tsv" | "txt" => {
                let content = read_file_as_utf8(path)?;
                Self::from_delimited(&label, &content)
            }
            _ => Self::open_spreadsheet(path, &label),
        }
    }

    /// Parse delimited text as a single-sheet workbook, sniffing the delimiter
    pub fn from_delimited(label: &str, content: &str) -> Result<Self, SourceError> {
        let delimiter = sniff_delimiter(content);
        debug!("Parsing {} with delimiter {:?}", label, delimiter as char);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| SourceError::Csv(e.to_string()))?;
            rows.push(record.iter().map(|f| f.trim().to_string()).collect());
        }

        Ok(Self::new(label, vec![Sheet { name: "Sheet1".to_string(), rows }]))
    }

    fn open_spreadsheet(path: &Path, label: &str) -> Result<Self, SourceError> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(SourceError::NoSheets(label.to_string()));
        }

        let sheets = collect_sheets(&sheet_names, |name| {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| SourceError::Sheet {
                    sheet: name.to_string(),
                    message: e.to_string(),
                })?;

            // Ranges start at the first used cell; pad so row indices match the sheet
            let leading = range.start().map_or(0, |(row, _)| row as usize);
            let mut rows: Vec<Vec<String>> = vec![Vec::new(); leading];
            rows.extend(range.rows().map(|row| row.iter().map(cell_text).collect()));
            Ok(rows)
        });

        Ok(Self::new(label, sheets))
    }
}

/// Load every named sheet. A sheet that fails to load is kept empty so the
/// rest of the workbook still extracts and the sheet is reported as skipped.
fn collect_sheets<F>(names: &[String], mut load: F) -> Vec<Sheet>
where
    F: FnMut(&str) -> Result<Vec<Vec<String>>, SourceError>,
{
    names
        .iter()
        .map(|name| {
            let rows = load(name).unwrap_or_else(|e| {
                warn!("{}", e);
                Vec::new()
            });
            Sheet {
                name: name.clone(),
                rows,
            }
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Read a file as UTF-8, falling back to Windows-1252 for Excel-exported text
fn read_file_as_utf8(path: &Path) -> Result<String, SourceError> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Pick the delimiter giving the most consistent multi-field split of the first lines
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b',', b';', b'\t', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map_or(1, |r| r.len())
            })
            .collect();

        // Widest split wins, weighted by how many lines agree with it
        let Some(&widest) = counts.iter().max() else {
            continue;
        };
        if widest <= 1 {
            continue;
        }
        let consistent = counts.iter().filter(|&&c| c == widest).count();
        let score = consistent * widest;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_unreadable_sheet_kept_empty() {
        let names = vec!["Broken".to_string(), "Loading".to_string()];
        let sheets = collect_sheets(&names, |name| {
            if name == "Broken" {
                return Err(SourceError::Sheet {
                    sheet: name.to_string(),
                    message: "corrupt xml".to_string(),
                });
            }
            Ok(vec![
                vec!["VIN".to_string(), "Make".to_string()],
                vec!["VF38AHNZP8L123456".to_string(), "Peugeot".to_string()],
            ])
        });

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Broken");
        assert!(sheets[0].is_empty());
        assert_eq!(sheets[1].cell(1, 0), "VF38AHNZP8L123456");
    }

    #[test]
    fn test_sniff_semicolon() {
        let content = "Title line\nVIN;Make;Model\nVF38AHNZP8L123456;Peugeot;208\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_defaults_to_comma() {
        assert_eq!(sniff_delimiter(""), b',');
        assert_eq!(sniff_delimiter("just one column\nanother"), b',');
    }

    #[test]
    fn test_from_delimited_rows() {
        let wb = Workbook::from_delimited("paste.csv", "VIN,Make\n VF38AHNZP8L123456 ,Peugeot\n")
            .unwrap();
        assert_eq!(wb.sheets.len(), 1);
        assert_eq!(wb.sheets[0].cell(1, 0), "VF38AHNZP8L123456");
        assert_eq!(wb.sheets[0].cell(5, 5), "");
    }

    #[test]
    fn test_open_csv_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.csv");
        fs::write(&path, "VIN;Brand;Model\nVF38AHNZP8L123456;PEUGEOT;P208\n").unwrap();

        let wb = Workbook::open(&path).unwrap();
        assert_eq!(wb.label, "manifest.csv");
        assert_eq!(wb.sheets[0].rows[0], vec!["VIN", "Brand", "Model"]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        assert!(Workbook::open(&dir.path().join("absent.csv")).is_err());
        assert!(Workbook::open(&dir.path().join("absent.xlsx")).is_err());
    }

    #[test]
    fn test_blank_rows() {
        let sheet = Sheet::new("S", vec![vec!["", " "], vec!["x", ""]]);
        assert!(sheet.is_blank_row(0));
        assert!(!sheet.is_blank_row(1));
        assert!(sheet.is_blank_row(7));
        assert!(!sheet.is_empty());
    }
}
