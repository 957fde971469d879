//! Scan extraction configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Image extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Channel spread (max - min) above which a pixel counts as colored ink
    pub chroma_threshold: u8,

    /// Fraction of the remaining distance to white applied to ink pixels (0-1)
    pub ink_lift: f32,

    /// Pixels whose brightest channel is below this are print, never ink
    pub print_floor: u8,

    /// Gamma applied after ink removal (> 1 darkens faded text)
    pub gamma: f32,

    /// OCR-confusion substitutions allowed per recovered VIN
    pub max_corrections: usize,

    /// Language hint passed to the recognition engine
    pub language: String,

    /// Seconds a recognition call may take before its result is discarded
    pub recognition_timeout_secs: u64,

    /// Tesseract executable
    pub tesseract_path: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chroma_threshold: 60,
            ink_lift: 0.85,
            print_floor: 64,
            gamma: 1.6,
            max_corrections: 2,
            language: "eng".to_string(),
            recognition_timeout_secs: 60,
            tesseract_path: PathBuf::from("tesseract"),
        }
    }
}

impl ScanConfig {
    /// Create strict config (no OCR corrections)
    pub fn strict() -> Self {
        Self {
            max_corrections: 0,
            ..Default::default()
        }
    }
}
