//! Paper Manifest Scan Extraction
//!
//! Recovers VINs from photographs of paper load sheets:
//! - Ink filter suppressing colored pen marks
//! - Gamma correction for faded print
//! - Pluggable text recognition engine (Tesseract by default)
//! - OCR-confusion repair before VIN validation

pub mod config;
pub mod frame;
pub mod ink;
pub mod recognize;
pub mod recovery;

pub use config::ScanConfig;
pub use frame::ScanFrame;
pub use ink::InkFilter;
pub use recognize::{
    fragments_from_text, RecognizeError, TesseractRecognizer, TextFragment, TextRecognizer,
};
pub use recovery::{IdentifierScanner, Recovered};

use std::sync::Arc;

use data_validator::{Fallback, Normalizer, RawRecord, SourceKind, Validator};
use image::GrayImage;
use thiserror::Error;
use tracing::{debug, info};

/// Scan extraction error types
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Image decoding failed: {0}")]
    Decode(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Text recognition failed: {0}")]
    Recognition(#[from] RecognizeError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result of extracting one scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub records: Vec<RawRecord>,
    /// Text fragments returned by the recognizer
    pub fragments: usize,
    /// OCR-confusion substitutions applied across all records
    pub corrections: usize,
}

/// Image extractor
pub struct ScanExtractor {
    config: ScanConfig,
    ink_filter: InkFilter,
    scanner: IdentifierScanner,
    recognizer: Arc<dyn TextRecognizer>,
    normalizer: Arc<Normalizer>,
}

impl ScanExtractor {
    /// Create a new extractor around a recognition engine
    pub fn new(
        config: ScanConfig,
        validator: Validator,
        recognizer: Arc<dyn TextRecognizer>,
        normalizer: Arc<Normalizer>,
    ) -> Result<Self, ScanError> {
        let scanner = IdentifierScanner::new(validator, config.max_corrections)
            .map_err(|e| ScanError::Config(e.to_string()))?;
        Ok(Self {
            ink_filter: InkFilter::new(&config),
            scanner,
            recognizer,
            normalizer,
            config,
        })
    }

    /// Ink removal and contrast normalization
    pub fn preprocess(&self, frame: &ScanFrame) -> GrayImage {
        self.ink_filter.apply(frame)
    }

    /// Extract low-confidence records from a scan. Zero recognized VINs is not an error.
    pub fn extract(
        &self,
        frame: &ScanFrame,
        label: &str,
        fallback: &Fallback,
    ) -> Result<ScanReport, ScanError> {
        if frame.is_empty() {
            return Err(ScanError::InvalidFrame(format!("{} has no pixels", label)));
        }

        let processed = self.preprocess(frame);
        let fragments = self
            .recognizer
            .recognize(&processed, &self.config.language)?;

        let report = self.records_from_fragments(&fragments, label, fallback);
        info!(
            "{}: {} VINs from {} text fragments ({} corrections)",
            label,
            report.records.len(),
            report.fragments,
            report.corrections
        );
        Ok(report)
    }

    /// Build records from already recognized text
    pub fn records_from_fragments(
        &self,
        fragments: &[TextFragment],
        label: &str,
        fallback: &Fallback,
    ) -> ScanReport {
        let mut report = ScanReport {
            fragments: fragments.len(),
            ..Default::default()
        };

        for found in self.scanner.scan(fragments) {
            let line_brand = fragments
                .iter()
                .find(|f| f.line == found.line)
                .and_then(|f| self.normalizer.detect_brand(&f.text));

            let Some(record) = RawRecord::new(&found.vin, SourceKind::Image, label) else {
                continue;
            };
            if found.corrections > 0 {
                debug!("Recovered {} with {} corrections", found.vin, found.corrections);
            }
            report.corrections += found.corrections;
            report
                .records
                .push(record.with_brand(line_brand.as_deref()).with_fallback(fallback));
        }

        report
    }
}
