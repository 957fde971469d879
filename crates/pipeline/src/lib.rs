//! VDAT Reconciliation Pipeline
//!
//! Runs every extractor over one submission and merges the results:
//! - Spreadsheet/CSV sources through the header hunter
//! - One manifest photograph through the scan extractor
//! - One pasted text block through the free-text extractor
//! - Reconciliation into one canonical record per VIN

pub mod codes;
pub mod config;
pub mod export;

pub use crate::config::{RunConfig, RunSettings};
pub use export::VdatRow;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use data_validator::{CanonicalRecord, Fallback, Normalizer, RawRecord, Validator, VinPolicy};
use header_hunter::{HeaderHunter, HuntReport, SourceError, Workbook};
use reconcile::{ReconcileError, Reconciler};
use scan_extractor::{
    ScanError, ScanExtractor, ScanFrame, ScanReport, TesseractRecognizer, TextRecognizer,
};
use serde::{Deserialize, Serialize};
use text_extractor::TextExtractor;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Pipeline error types. Source-level failures are summarized, not raised.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Pipeline setup failed: {0}")]
    Setup(String),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Export failed: {0}")]
    Export(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the global tracing subscriber (INFO, with targets)
pub fn init_logging(json: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// A spreadsheet source, loaded by the pipeline or already in memory
#[derive(Debug, Clone)]
pub enum TabularInput {
    File(PathBuf),
    Loaded(Workbook),
}

impl TabularInput {
    fn label(&self) -> String {
        match self {
            TabularInput::File(path) => path.display().to_string(),
            TabularInput::Loaded(workbook) => workbook.label.clone(),
        }
    }

    fn load(self) -> Result<Workbook, SourceError> {
        match self {
            TabularInput::File(path) => Workbook::open(&path),
            TabularInput::Loaded(workbook) => Ok(workbook),
        }
    }
}

/// A manifest photograph, decoded by the pipeline or already in memory
#[derive(Debug, Clone)]
pub enum ImageInput {
    File(PathBuf),
    Decoded { label: String, frame: ScanFrame },
}

impl ImageInput {
    fn label(&self) -> String {
        match self {
            ImageInput::File(path) => path.display().to_string(),
            ImageInput::Decoded { label, .. } => label.clone(),
        }
    }

    fn load(self) -> Result<ScanFrame, ScanError> {
        match self {
            ImageInput::File(path) => ScanFrame::open(&path),
            ImageInput::Decoded { frame, .. } => Ok(frame),
        }
    }
}

/// Everything submitted for one run
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub tabular: Vec<TabularInput>,
    pub image: Option<ImageInput>,
    pub text: Option<String>,
}

/// Diagnostic counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub sources_processed: usize,
    pub sheets_processed: usize,
    pub sheets_skipped: usize,
    pub sources_failed: usize,
    /// Raw records produced by all extractors
    pub records_extracted: usize,
    /// Canonical records taken from an image or free-text source
    pub low_confidence_records: usize,
    pub invalid_dropped: usize,
    pub duplicates_resolved: usize,
    pub canonical_records: usize,
    pub warnings: Vec<String>,
}

impl RunSummary {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn absorb_hunt(&mut self, report: &HuntReport) {
        self.sources_processed += 1;
        self.sheets_processed += report.sheets_processed;
        self.sheets_skipped += report.sheets_skipped;
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub batch_ref: String,
    pub customer_code: String,
    pub poa_code: String,
    pub records: Vec<CanonicalRecord>,
    pub summary: RunSummary,
}

impl RunReport {
    /// VDAT rows for this run, assigned on `date`
    pub fn vdat_rows(&self, date: NaiveDate) -> Vec<VdatRow> {
        export::vdat_rows(&self.records, &self.customer_code, &self.poa_code, date)
    }
}

/// Extractors and reconciler configured for a run
pub struct Pipeline {
    config: RunConfig,
    hunter: HeaderHunter,
    scanner: Arc<ScanExtractor>,
    text: TextExtractor,
    reconciler: Reconciler,
}

impl Pipeline {
    /// Create a pipeline recognizing images with the configured Tesseract binary
    pub fn new(config: RunConfig) -> Result<Self, PipelineError> {
        let recognizer = Arc::new(
            TesseractRecognizer::new(config.scan.tesseract_path.clone()).with_timeout(
                Duration::from_secs(config.scan.recognition_timeout_secs),
            ),
        );
        Self::with_recognizer(config, recognizer)
    }

    /// Create a pipeline around any recognition engine
    pub fn with_recognizer(
        config: RunConfig,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Result<Self, PipelineError> {
        let normalizer = Arc::new(
            Normalizer::standard().with_aliases(
                config
                    .brands
                    .iter()
                    .map(|(alias, code)| (alias.as_str(), code.as_str())),
            ),
        );
        let validator = Validator::new(VinPolicy {
            strict_serial: config.run.strict_serial,
        });

        let scanner = ScanExtractor::new(
            config.scan.clone(),
            validator.clone(),
            recognizer,
            normalizer.clone(),
        )
        .map_err(|e| PipelineError::Setup(e.to_string()))?;
        let text = TextExtractor::new(normalizer.clone())
            .map_err(|e| PipelineError::Setup(e.to_string()))?;

        Ok(Self {
            hunter: HeaderHunter::new(config.hunter.clone()),
            scanner: Arc::new(scanner),
            text,
            reconciler: Reconciler::new(normalizer, validator),
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Configured batch reference, or DDMMYYYY + customer code for `today`
    pub fn batch_ref(&self, today: NaiveDate) -> String {
        match self.config.run.batch_ref.as_deref().map(str::trim) {
            Some(batch_ref) if !batch_ref.is_empty() => batch_ref.to_string(),
            _ => codes::default_batch_ref(today, &codes::customer_code(&self.config.run.customer)),
        }
    }

    fn fallback(&self) -> Fallback {
        Fallback::new(
            self.config.run.fallback_brand.as_deref(),
            self.config.run.fallback_model.as_deref(),
        )
    }

    /// Extract every input and reconcile. Failing sources become warnings.
    pub async fn run(&self, inputs: RunInputs) -> Result<RunReport, PipelineError> {
        let batch_ref = self.batch_ref(Local::now().date_naive());
        let fallback = self.fallback();
        let mut summary = RunSummary::default();
        let mut raw: Vec<RawRecord> = Vec::new();

        info!("Starting run {}", batch_ref);

        let tabular: Vec<(String, JoinHandle<Result<HuntReport, SourceError>>)> = inputs
            .tabular
            .into_iter()
            .map(|input| {
                let label = input.label();
                let hunter = self.hunter.clone();
                let task = tokio::task::spawn_blocking(move || {
                    let workbook = input.load()?;
                    Ok(hunter.extract(&workbook))
                });
                (label, task)
            })
            .collect();

        // The recognition deadline runs from spawn, alongside the sheet tasks
        let limit = Duration::from_secs(self.config.scan.recognition_timeout_secs);
        let image = inputs
            .image
            .map(|input| self.spawn_scan(input, fallback.clone(), limit));

        for (label, task) in tabular {
            match task.await {
                Ok(Ok(report)) => {
                    summary.absorb_hunt(&report);
                    raw.extend(report.records);
                }
                Ok(Err(e)) => {
                    summary.sources_failed += 1;
                    summary.warn(format!("{}: {}", label, e));
                }
                Err(e) => {
                    summary.sources_failed += 1;
                    summary.warn(format!("{}: extraction task failed: {}", label, e));
                }
            }
        }

        if let Some(scan) = image {
            let label = scan.label.clone();
            match Self::await_scan(scan, &mut summary).await {
                Some(report) => {
                    summary.sources_processed += 1;
                    if report.records.is_empty() {
                        summary.warn(format!("{}: no VINs recognized", label));
                    }
                    raw.extend(report.records);
                }
                None => summary.sources_failed += 1,
            }
        }

        if let Some(text) = inputs.text.as_deref() {
            if text.trim().is_empty() {
                summary.warn("pasted text is empty".to_string());
            } else {
                let report = self.text.extract(text, "pasted text", &fallback);
                summary.sources_processed += 1;
                raw.extend(report.records);
            }
        }

        summary.records_extracted = raw.len();
        let merged = self.reconciler.reconcile(&raw, &batch_ref)?;
        summary.low_confidence_records = merged.low_confidence;
        summary.invalid_dropped = merged.invalid_dropped;
        summary.duplicates_resolved = merged.duplicates_resolved;
        summary.canonical_records = merged.records.len();

        info!(
            "Run {} complete: {} canonical records from {} extracted ({} warnings)",
            batch_ref,
            summary.canonical_records,
            summary.records_extracted,
            summary.warnings.len()
        );

        Ok(RunReport {
            batch_ref,
            customer_code: codes::customer_code(&self.config.run.customer),
            poa_code: codes::poa_code(&self.config.run.poa),
            records: merged.records,
            summary,
        })
    }

    /// Start extracting an image on the blocking pool. Its deadline is fixed now.
    fn spawn_scan(&self, input: ImageInput, fallback: Fallback, limit: Duration) -> ScanTask {
        let label = input.label();
        let scanner = self.scanner.clone();
        let task_label = label.clone();
        let deadline = Instant::now() + limit;
        let handle = tokio::task::spawn_blocking(move || {
            let frame = input.load()?;
            scanner.extract(&frame, &task_label, &fallback)
        });
        ScanTask {
            label,
            handle,
            deadline,
            limit,
        }
    }

    /// Wait for the scan task. Timeouts and failures are warnings and yield `None`.
    async fn await_scan(scan: ScanTask, summary: &mut RunSummary) -> Option<ScanReport> {
        let label = &scan.label;
        match tokio::time::timeout_at(scan.deadline, scan.handle).await {
            Ok(Ok(Ok(report))) => Some(report),
            Ok(Ok(Err(e))) => {
                summary.warn(format!("{}: {}", label, e));
                None
            }
            Ok(Err(e)) => {
                summary.warn(format!("{}: scan task failed: {}", label, e));
                None
            }
            Err(_) => {
                summary.warn(format!(
                    "{}: text recognition timed out after {}s",
                    label,
                    scan.limit.as_secs()
                ));
                None
            }
        }
    }
}

/// Image extraction in flight
struct ScanTask {
    label: String,
    handle: JoinHandle<Result<ScanReport, ScanError>>,
    deadline: Instant,
    limit: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(config: RunConfig) -> Pipeline {
        Pipeline::new(config).unwrap()
    }

    /// Recognizer that reads one VIN after a fixed delay
    struct Slow(Duration);

    impl TextRecognizer for Slow {
        fn recognize(
            &self,
            _image: &image::GrayImage,
            _language: &str,
        ) -> Result<Vec<scan_extractor::TextFragment>, scan_extractor::RecognizeError> {
            std::thread::sleep(self.0);
            Ok(scan_extractor::fragments_from_text("VF38AHNZP8L123456"))
        }
    }

    fn scan_input() -> ImageInput {
        ImageInput::Decoded {
            label: "scan.jpg".to_string(),
            frame: ScanFrame::new(vec![255; 4 * 4 * 3], 4, 4).unwrap(),
        }
    }

    #[test]
    fn test_batch_ref_default_and_override() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let mut config = RunConfig::default();
        config.run.customer = "Stellantis".to_string();
        assert_eq!(pipeline(config.clone()).batch_ref(today), "16102026STS");

        config.run.batch_ref = Some("  ".to_string());
        assert_eq!(pipeline(config.clone()).batch_ref(today), "16102026STS");

        config.run.batch_ref = Some("V-042".to_string());
        assert_eq!(pipeline(config).batch_ref(today), "V-042");
    }

    #[test]
    fn test_fallback_from_settings() {
        let mut config = RunConfig::default();
        config.run.fallback_brand = Some("INEOS".to_string());
        config.run.fallback_model = Some(" ".to_string());
        assert_eq!(
            pipeline(config).fallback(),
            Fallback::new(Some("INEOS"), None)
        );
    }

    #[tokio::test]
    async fn test_scan_deadline_counts_from_spawn() {
        let slow = Pipeline::with_recognizer(
            RunConfig::default(),
            Arc::new(Slow(Duration::from_millis(700))),
        )
        .unwrap();

        // Awaited late, as behind slow sheet tasks: the deadline has already passed
        let scan = slow.spawn_scan(scan_input(), Fallback::default(), Duration::from_millis(300));
        tokio::time::sleep(Duration::from_millis(600)).await;
        let mut summary = RunSummary::default();
        assert!(Pipeline::await_scan(scan, &mut summary).await.is_none());
        assert!(summary.warnings[0].contains("timed out"));

        let scan = slow.spawn_scan(scan_input(), Fallback::default(), Duration::from_secs(5));
        let mut summary = RunSummary::default();
        let report = Pipeline::await_scan(scan, &mut summary).await.unwrap();
        assert_eq!(report.records.len(), 1);
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            canonical_records: 2,
            warnings: vec!["scan.jpg: no VINs recognized".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["canonical_records"], 2);
        assert_eq!(json["warnings"][0], "scan.jpg: no VINs recognized");
    }

    #[tokio::test]
    async fn test_empty_run_completes() {
        let report = pipeline(RunConfig::default())
            .run(RunInputs::default())
            .await
            .unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.summary, RunSummary::default());
        assert_eq!(report.customer_code, "HOD");
        assert_eq!(report.poa_code, "GRIM");
    }
}
