//! Text recognition engines

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::{GrayImage, ImageFormat};
use thiserror::Error;
use tracing::{debug, warn};

/// How often a running engine is checked against its timeout
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Recognition engine errors
#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("Recognition engine unavailable: {0}")]
    Unavailable(String),

    #[error("Recognition engine failed: {0}")]
    Engine(String),

    #[error("Failed to stage image for recognition: {0}")]
    Staging(String),

    #[error("Recognition engine killed after {0:?}")]
    TimedOut(Duration),
}

impl From<std::io::Error> for RecognizeError {
    fn from(err: std::io::Error) -> Self {
        RecognizeError::Staging(err.to_string())
    }
}

/// One recognized piece of text, in approximate reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    pub text: String,
    /// Line position in the recognized page
    pub line: usize,
}

impl TextFragment {
    pub fn new(text: &str, line: usize) -> Self {
        Self {
            text: text.to_string(),
            line,
        }
    }
}

/// Split engine output into one fragment per non-blank line
pub fn fragments_from_text(text: &str) -> Vec<TextFragment> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line, text)| TextFragment::new(text.trim(), line))
        .collect()
}

/// Any engine that turns a processed image into text fragments
pub trait TextRecognizer: Send + Sync {
    fn recognize(
        &self,
        image: &GrayImage,
        language: &str,
    ) -> Result<Vec<TextFragment>, RecognizeError>;
}

/// Recognizer backed by the `tesseract` command line tool
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    page_segmentation: u8,
    timeout: Option<Duration>,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            // uniform block of text
            page_segmentation: 6,
            timeout: None,
        }
    }

    /// Kill the engine process once it has run for `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the engine on a staged image. Output goes to files so a chatty
    /// engine can never block on a full pipe while being polled.
    fn run_engine(&self, staged: &Path, language: &str) -> Result<String, RecognizeError> {
        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;

        let mut child = Command::new(&self.binary)
            .arg(staged)
            .arg("stdout")
            .args(["-l", language])
            .args(["--psm", &self.page_segmentation.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| {
                RecognizeError::Unavailable(format!("{}: {}", self.binary.display(), e))
            })?;

        let status = self.wait(&mut child)?;
        if !status.success() {
            let message = read_back(&mut stderr)?;
            return Err(RecognizeError::Engine(message.trim().to_string()));
        }
        read_back(&mut stdout)
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, RecognizeError> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait()?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                if let Err(e) = child.kill() {
                    warn!("Failed to kill {}: {}", self.binary.display(), e);
                }
                // reap
                child.wait()?;
                return Err(RecognizeError::TimedOut(limit));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn read_back(file: &mut File) -> Result<String, RecognizeError> {
    file.rewind()?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(
        &self,
        image: &GrayImage,
        language: &str,
    ) -> Result<Vec<TextFragment>, RecognizeError> {
        let staged = tempfile::Builder::new()
            .prefix("manifest-scan-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(staged.path(), ImageFormat::Png)
            .map_err(|e| RecognizeError::Staging(e.to_string()))?;

        let text = self.run_engine(staged.path(), language)?;
        let fragments = fragments_from_text(&text);
        debug!("Tesseract returned {} lines", fragments.len());
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_skip_blank_lines() {
        let fragments = fragments_from_text("HEADER\n\n  VF38AHNZP8L123456  \n");
        assert_eq!(
            fragments,
            vec![
                TextFragment::new("HEADER", 0),
                TextFragment::new("VF38AHNZP8L123456", 2),
            ]
        );
    }

    /// Stand-in engine: a shell script ignoring its arguments
    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("engine.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_output_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TesseractRecognizer::new(script(
            dir.path(),
            "echo 'LOAD SHEET'; echo; echo VF38AHNZP8L123456",
        ))
        .with_timeout(Duration::from_secs(10));
        let fragments = engine.recognize(&GrayImage::new(4, 4), "eng").unwrap();
        assert_eq!(fragments[1], TextFragment::new("VF38AHNZP8L123456", 2));
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let engine =
            TesseractRecognizer::new(script(dir.path(), "echo 'no traineddata' >&2; exit 1"));
        assert!(matches!(
            engine.recognize(&GrayImage::new(4, 4), "xyz"),
            Err(RecognizeError::Engine(msg)) if msg == "no traineddata"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_engine_killed() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TesseractRecognizer::new(script(dir.path(), "exec sleep 30"))
            .with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        assert!(matches!(
            engine.recognize(&GrayImage::new(4, 4), "eng"),
            Err(RecognizeError::TimedOut(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let engine = TesseractRecognizer::new("/nonexistent/tesseract-binary");
        let image = GrayImage::new(4, 4);
        assert!(matches!(
            engine.recognize(&image, "eng"),
            Err(RecognizeError::Unavailable(_))
        ));
    }
}
