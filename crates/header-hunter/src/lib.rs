//! Header Hunter
//!
//! Locates the true header row and data region of spreadsheet manifests
//! whose layout, column order and naming vary per shipping line:
//! - Bounded top-down header scan per sheet
//! - Keyword/synonym classification of header cells
//! - Pivot-table and legend rejection
//! - Row extraction until the first blank row

pub mod config;
pub mod source;
pub mod synonyms;

pub use config::HunterConfig;
pub use source::{Sheet, Workbook};
pub use synonyms::Field;

use data_validator::{is_plausible_identifier, RawRecord, SourceKind};
use thiserror::Error;
use tracing::{debug, info};

/// Source loading errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open workbook: {0}")]
    Open(String),

    #[error("Workbook contains no sheets: {0}")]
    NoSheets(String),

    #[error("Failed to read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },

    #[error("CSV parse error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Column positions of the record fields in a located header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLayout {
    /// Row index of the header
    pub row: usize,
    pub identifier: usize,
    pub brand: Option<usize>,
    pub model: Option<usize>,
}

/// Extraction result for one workbook
#[derive(Debug, Clone, Default)]
pub struct HuntReport {
    pub records: Vec<RawRecord>,
    /// Sheets where a header row was found
    pub sheets_processed: usize,
    /// Sheets with no header inside the scan window
    pub sheets_skipped: usize,
    /// Data rows without a plausible identifier
    pub rows_dropped: usize,
}

impl HuntReport {
    fn absorb(&mut self, other: HuntReport) {
        self.records.extend(other.records);
        self.sheets_processed += other.sheets_processed;
        self.sheets_skipped += other.sheets_skipped;
        self.rows_dropped += other.rows_dropped;
    }
}

/// Tabular extractor
#[derive(Debug, Clone, Default)]
pub struct HeaderHunter {
    config: HunterConfig,
}

impl HeaderHunter {
    /// Create a new header hunter with given config
    pub fn new(config: HunterConfig) -> Self {
        Self { config }
    }

    /// Extract records from every sheet of a workbook. Sheets without a header are skipped.
    pub fn extract(&self, workbook: &Workbook) -> HuntReport {
        let mut report = HuntReport::default();
        for sheet in &workbook.sheets {
            report.absorb(self.extract_sheet(&workbook.label, sheet));
        }

        info!(
            "{}: {} records from {} sheets ({} skipped, {} rows dropped)",
            workbook.label,
            report.records.len(),
            report.sheets_processed,
            report.sheets_skipped,
            report.rows_dropped
        );
        report
    }

    /// Extract records from a single sheet
    pub fn extract_sheet(&self, workbook_label: &str, sheet: &Sheet) -> HuntReport {
        let Some(layout) = self.locate_header(sheet) else {
            debug!("No header row in sheet '{}', skipping", sheet.name);
            return HuntReport {
                sheets_skipped: 1,
                ..Default::default()
            };
        };

        debug!("Sheet '{}': header at row {}", sheet.name, layout.row);

        let label = if workbook_label.is_empty() {
            sheet.name.clone()
        } else {
            format!("{}/{}", workbook_label, sheet.name)
        };

        let mut report = HuntReport {
            sheets_processed: 1,
            ..Default::default()
        };

        for row in (layout.row + 1)..sheet.rows.len() {
            if sheet.is_blank_row(row) {
                break;
            }

            let identifier = sheet.cell(row, layout.identifier);
            if !is_plausible_identifier(identifier) {
                report.rows_dropped += 1;
                continue;
            }

            let record = RawRecord::new(identifier, SourceKind::Tabular, &label).map(|r| {
                r.with_brand(layout.brand.map(|c| sheet.cell(row, c)))
                    .with_model(layout.model.map(|c| sheet.cell(row, c)))
            });
            match record {
                Some(record) => report.records.push(record),
                None => report.rows_dropped += 1,
            }
        }

        report
    }

    /// Find the header row within the scan window
    pub fn locate_header(&self, sheet: &Sheet) -> Option<HeaderLayout> {
        sheet
            .rows
            .iter()
            .take(self.config.scan_limit)
            .enumerate()
            .find_map(|(index, cells)| self.match_header(index, cells))
    }

    fn match_header(&self, row: usize, cells: &[String]) -> Option<HeaderLayout> {
        if cells.iter().any(|c| synonyms::is_pivot_marker(c)) {
            return None;
        }

        let fields: Vec<(usize, Field)> = cells
            .iter()
            .enumerate()
            .filter_map(|(col, cell)| synonyms::classify(cell).map(|f| (col, f)))
            .collect();

        let first = |wanted: Field| {
            fields
                .iter()
                .find(|(_, f)| *f == wanted)
                .map(|(col, _)| *col)
        };

        let identifier = first(Field::Identifier)?;
        // Only one identifier column counts toward the keyword minimum
        let others = fields
            .iter()
            .filter(|(_, f)| *f != Field::Identifier)
            .count();
        if others + 1 < self.config.min_keyword_matches.max(1) {
            return None;
        }

        Some(HeaderLayout {
            row,
            identifier,
            brand: first(Field::Brand),
            model: first(Field::Model),
        })
    }
}
