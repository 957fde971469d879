//! Free-Text Extraction
//!
//! Pulls VINs out of pasted text such as e-mail bodies. A token following
//! the VIN across a separator (`VIN - MODEL - DESTINATION`, `VIN-MODEL`,
//! pipes, semicolons, tab-aligned columns) is taken as the model.

use std::sync::Arc;

use data_validator::{Fallback, Normalizer, RawRecord, SourceKind};
use regex::Regex;
use tracing::{debug, info};

/// Result of extracting one text block
#[derive(Debug, Clone, Default)]
pub struct TextReport {
    pub records: Vec<RawRecord>,
    /// Non-blank lines inspected
    pub lines_scanned: usize,
    /// Lines yielding at least one VIN
    pub lines_matched: usize,
}

/// Free-text extractor
pub struct TextExtractor {
    vin: Regex,
    separators: Regex,
    normalizer: Arc<Normalizer>,
}

impl TextExtractor {
    pub fn new(normalizer: Arc<Normalizer>) -> Result<Self, regex::Error> {
        Ok(Self {
            vin: Regex::new(r"\b[A-HJ-NPR-Z0-9]{17}\b")?,
            separators: Regex::new(r"\s+[-–—/]+\s+|\s*[|;,\t]\s*|\s{2,}")?,
            normalizer,
        })
    }

    /// Extract low-confidence records, one per VIN occurrence, in text order
    pub fn extract(&self, text: &str, label: &str, fallback: &Fallback) -> TextReport {
        let mut report = TextReport::default();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            report.lines_scanned += 1;
            let upper = line.to_uppercase();
            let found = self.extract_line(&upper, label, fallback);
            if !found.is_empty() {
                report.lines_matched += 1;
                report.records.extend(found);
            }
        }

        info!(
            "{}: {} VINs on {} of {} lines",
            label,
            report.records.len(),
            report.lines_matched,
            report.lines_scanned
        );
        report
    }

    fn extract_line(&self, line: &str, label: &str, fallback: &Fallback) -> Vec<RawRecord> {
        let vins: Vec<&str> = self.vin.find_iter(line).map(|m| m.as_str()).collect();
        if vins.is_empty() {
            return Vec::new();
        }

        let brand = self.normalizer.detect_brand(line);
        let tokens: Vec<&str> = self
            .separators
            .split(line)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        vins.into_iter()
            .filter_map(|vin| {
                let model = self.model_after(&tokens, vin);
                debug!("Free text VIN {} model {:?}", vin, model);
                RawRecord::new(vin, SourceKind::FreeText, label).map(|record| {
                    record
                        .with_brand(brand.as_deref())
                        .with_model(model)
                        .with_fallback(fallback)
                })
            })
            .collect()
    }

    /// First token after the VIN's token that is neither another VIN nor a bare brand name.
    /// Columns glued to the VIN by a bare dash or slash (`VIN-MODEL-DEST`) come first.
    fn model_after<'a>(&self, tokens: &[&'a str], vin: &str) -> Option<&'a str> {
        let position = tokens.iter().position(|t| t.contains(vin))?;
        let token = tokens[position];
        let tail = token.find(vin).map_or("", |i| &token[i + vin.len()..]);
        let glued = tail
            .starts_with(is_dash)
            .then(|| tail.split(is_dash))
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        glued
            .chain(tokens[position + 1..].iter().copied())
            .take_while(|t| !self.vin.is_match(t))
            .find(|t| self.normalizer.brands().lookup(t).is_none())
            .filter(|t| t.chars().any(char::is_alphanumeric))
    }
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '–' | '—' | '/')
}
