//! Raw and canonical manifest records

use serde::{Deserialize, Serialize};

use crate::normalizer::UNKNOWN_BRAND;
use crate::validator::clean_identifier;

/// Where a raw record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Spreadsheet cell read directly
    Tabular,
    /// Recognized from a photographed manifest
    Image,
    /// Pasted unstructured text
    FreeText,
}

impl SourceKind {
    /// Trust level of values produced by this kind of source
    pub fn confidence(self) -> Confidence {
        match self {
            SourceKind::Tabular => Confidence::High,
            SourceKind::Image | SourceKind::FreeText => Confidence::Low,
        }
    }
}

/// Trust level of a raw record. Orders `Low < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    High,
}

/// Unvalidated record produced by an extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Candidate identifier, never empty
    pub identifier: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub source_kind: SourceKind,
    /// Sheet, file or session the record came from
    pub source_label: String,
    pub confidence: Confidence,
}

impl RawRecord {
    /// Create a record, or `None` when the identifier cleans down to nothing
    pub fn new(identifier: &str, source_kind: SourceKind, source_label: &str) -> Option<Self> {
        let identifier = clean_identifier(identifier);
        if identifier.is_empty() {
            return None;
        }
        Some(Self {
            identifier,
            brand: None,
            model: None,
            source_kind,
            source_label: source_label.to_string(),
            confidence: source_kind.confidence(),
        })
    }

    /// Set the brand, ignoring blank values
    pub fn with_brand(mut self, brand: Option<&str>) -> Self {
        self.brand = non_blank(brand);
        self
    }

    /// Set the model, ignoring blank values
    pub fn with_model(mut self, model: Option<&str>) -> Self {
        self.model = non_blank(model);
        self
    }

    /// Fill brand and model from the fallback where the record recognized none
    pub fn with_fallback(mut self, fallback: &Fallback) -> Self {
        if self.brand.is_none() {
            self.brand = fallback.brand.clone();
        }
        if self.model.is_none() {
            self.model = fallback.model.clone();
        }
        self
    }
}

/// User-supplied brand/model for sources that rarely print them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallback {
    pub brand: Option<String>,
    pub model: Option<String>,
}

impl Fallback {
    pub fn new(brand: Option<&str>, model: Option<&str>) -> Self {
        Self {
            brand: non_blank(brand),
            model: non_blank(model),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Deduplicated, normalized output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Validated 17-character VIN, unique within a run
    pub vin: String,
    /// Canonical brand code or [`UNKNOWN_BRAND`]
    pub brand_code: String,
    pub model: String,
    /// Voyage/batch tag shared by every record of the run
    pub batch_ref: String,
}

impl CanonicalRecord {
    /// Whether the brand resolved to a canonical code
    pub fn has_known_brand(&self) -> bool {
        self.brand_code != UNKNOWN_BRAND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_identifier_rejected() {
        assert!(RawRecord::new("", SourceKind::Tabular, "Sheet1").is_none());
        assert!(RawRecord::new(" - ", SourceKind::Tabular, "Sheet1").is_none());
    }

    #[test]
    fn test_confidence_follows_source() {
        let tab = RawRecord::new("VF38AHNZP8L123456", SourceKind::Tabular, "Sheet1").unwrap();
        let img = RawRecord::new("VF38AHNZP8L123456", SourceKind::Image, "scan.jpg").unwrap();
        assert_eq!(tab.confidence, Confidence::High);
        assert_eq!(img.confidence, Confidence::Low);
        assert!(Confidence::High > Confidence::Low);
    }

    #[test]
    fn test_blank_brand_and_model_dropped() {
        let rec = RawRecord::new("vf38ahnzp8l123456", SourceKind::FreeText, "paste")
            .unwrap()
            .with_brand(Some("  "))
            .with_model(Some(" 208 "));
        assert_eq!(rec.identifier, "VF38AHNZP8L123456");
        assert_eq!(rec.brand, None);
        assert_eq!(rec.model.as_deref(), Some("208"));
    }

    #[test]
    fn test_fallback_does_not_override() {
        let fallback = Fallback::new(Some("OPEL"), Some(""));
        assert_eq!(fallback.model, None);

        let recognized = RawRecord::new("VF38AHNZP8L123456", SourceKind::Image, "scan")
            .unwrap()
            .with_brand(Some("PEUGEOT"))
            .with_fallback(&fallback);
        assert_eq!(recognized.brand.as_deref(), Some("PEUGEOT"));

        let bare = RawRecord::new("VF38AHNZP8L123456", SourceKind::Image, "scan")
            .unwrap()
            .with_fallback(&fallback);
        assert_eq!(bare.brand.as_deref(), Some("OPEL"));
        assert_eq!(bare.model, None);
    }
}
