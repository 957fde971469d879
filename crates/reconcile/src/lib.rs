//! Reconciliation Engine
//!
//! Merges raw records from every extractor of a run into one canonical
//! record per VIN:
//! - Identifier validation (invalid records dropped and counted)
//! - Brand/model normalization
//! - Priority selection: known brand, then confidence, then earliest seen
//!
//! Selection is all-or-nothing per record. Fields of a losing duplicate are
//! never merged into the survivor.

use std::collections::HashMap;
use std::sync::Arc;

use data_validator::{
    CanonicalRecord, Confidence, Normalizer, RawRecord, Validator, UNKNOWN_BRAND,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Reconciliation error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Batch reference must not be empty")]
    EmptyBatchRef,
}

/// Canonical set plus diagnostic counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    /// One record per distinct valid VIN, in first-seen order
    pub records: Vec<CanonicalRecord>,
    /// Raw records whose identifier failed validation
    pub invalid_dropped: usize,
    /// Raw records discarded in favor of a higher-priority duplicate
    pub duplicates_resolved: usize,
    /// Surviving records that came from a low-confidence source
    pub low_confidence: usize,
}

/// Candidate with the priority attributes used for selection
struct Candidate {
    record: CanonicalRecord,
    confidence: Confidence,
}

impl Candidate {
    /// Whether this candidate strictly beats the current holder of its VIN
    fn outranks(&self, current: &Candidate) -> bool {
        let known = self.record.has_known_brand();
        let current_known = current.record.has_known_brand();
        if known != current_known {
            return known;
        }
        self.confidence > current.confidence
    }
}

/// Reconciliation engine
pub struct Reconciler {
    normalizer: Arc<Normalizer>,
    validator: Validator,
}

impl Reconciler {
    pub fn new(normalizer: Arc<Normalizer>, validator: Validator) -> Self {
        Self {
            normalizer,
            validator,
        }
    }

    /// Normalize a raw record, or `None` when its identifier is not a valid VIN
    pub fn canonicalize(&self, raw: &RawRecord, batch_ref: &str) -> Option<CanonicalRecord> {
        let check = self.validator.check(&raw.identifier);
        if !check.valid {
            debug!(
                "Dropping {} from {}: {:?}",
                raw.identifier, raw.source_label, check.error
            );
            return None;
        }

        let brand_code = raw
            .brand
            .as_deref()
            .map(|b| self.normalizer.normalize_brand(b))
            .unwrap_or_else(|| UNKNOWN_BRAND.to_string());
        let model = raw
            .model
            .as_deref()
            .map(|m| {
                self.normalizer
                    .normalize_model_with_brand(m, raw.brand.as_deref(), &brand_code)
            })
            .unwrap_or_default();

        Some(CanonicalRecord {
            vin: check.normalized,
            brand_code,
            model,
            batch_ref: batch_ref.to_string(),
        })
    }

    /// Merge all raw records of a run. Input order defines "earliest seen".
    pub fn reconcile(
        &self,
        records: &[RawRecord],
        batch_ref: &str,
    ) -> Result<Reconciliation, ReconcileError> {
        let batch_ref = batch_ref.trim();
        if batch_ref.is_empty() {
            return Err(ReconcileError::EmptyBatchRef);
        }

        let mut result = Reconciliation::default();
        let mut survivors: Vec<Candidate> = Vec::new();
        let mut by_vin: HashMap<String, usize> = HashMap::new();

        for raw in records {
            let Some(record) = self.canonicalize(raw, batch_ref) else {
                result.invalid_dropped += 1;
                continue;
            };
            let candidate = Candidate {
                record,
                confidence: raw.confidence,
            };

            match by_vin.get(&candidate.record.vin) {
                Some(&slot) => {
                    result.duplicates_resolved += 1;
                    if candidate.outranks(&survivors[slot]) {
                        debug!(
                            "{} from {} replaces earlier record",
                            candidate.record.vin, raw.source_label
                        );
                        survivors[slot] = candidate;
                    }
                }
                None => {
                    by_vin.insert(candidate.record.vin.clone(), survivors.len());
                    survivors.push(candidate);
                }
            }
        }

        result.low_confidence = survivors
            .iter()
            .filter(|c| c.confidence == Confidence::Low)
            .count();
        result.records = survivors.into_iter().map(|c| c.record).collect();

        info!(
            "Reconciled {} raw records into {} ({} invalid, {} duplicates)",
            records.len(),
            result.records.len(),
            result.invalid_dropped,
            result.duplicates_resolved
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_validator::SourceKind;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const VIN_A: &str = "VF38AHNZP8L123456";
    const VIN_B: &str = "W0V0XEP68K4123456";

    fn reconciler() -> Reconciler {
        Reconciler::new(Arc::new(Normalizer::standard()), Validator::default())
    }

    fn raw(vin: &str, kind: SourceKind, brand: Option<&str>, model: Option<&str>) -> RawRecord {
        RawRecord::new(vin, kind, "test")
            .unwrap()
            .with_brand(brand)
            .with_model(model)
    }

    #[test]
    fn test_known_brand_wins_in_either_order() {
        let unknown = raw(VIN_A, SourceKind::Tabular, None, Some("208"));
        let known = raw(VIN_A, SourceKind::Tabular, Some("Peugeot"), Some("P208"));

        for input in [
            vec![unknown.clone(), known.clone()],
            vec![known.clone(), unknown.clone()],
        ] {
            let result = reconciler().reconcile(&input, "16102026STS").unwrap();
            assert_eq!(result.records.len(), 1);
            assert_eq!(result.records[0].brand_code, "PEUG");
            assert_eq!(result.records[0].model, "208");
            assert_eq!(result.duplicates_resolved, 1);
        }
    }

    #[test]
    fn test_unmapped_brand_counts_as_unknown() {
        let odd = raw(VIN_A, SourceKind::Tabular, Some("Trabant"), None);
        let known = raw(VIN_A, SourceKind::Image, Some("OPEL"), None);
        let result = reconciler().reconcile(&[odd, known], "B1").unwrap();
        assert_eq!(result.records[0].brand_code, "OPEL");
        assert_eq!(result.low_confidence, 1);
    }

    #[test]
    fn test_unmapped_brand_stripped_from_model() {
        let record = raw(VIN_A, SourceKind::Tabular, Some("Vauxhall"), Some("VAUXHALL CORSA"));
        let result = reconciler().reconcile(&[record], "B1").unwrap();
        assert_eq!(result.records[0].brand_code, UNKNOWN_BRAND);
        assert_eq!(result.records[0].model, "CORSA");
    }

    #[test]
    fn test_higher_confidence_wins() {
        let scanned = raw(VIN_A, SourceKind::Image, Some("PEUGEOT"), Some("2O8"));
        let sheet = raw(VIN_A, SourceKind::Tabular, Some("PEUG"), Some("208"));
        let result = reconciler().reconcile(&[scanned, sheet], "B1").unwrap();
        assert_eq!(result.records[0].model, "208");
        assert_eq!(result.low_confidence, 0);
    }

    #[test]
    fn test_earliest_seen_breaks_ties() {
        let first = raw(VIN_A, SourceKind::Tabular, Some("OPEL"), Some("CORSA"));
        let second = raw(VIN_A, SourceKind::Tabular, Some("OPEL"), Some("ASTRA"));
        let result = reconciler().reconcile(&[first, second], "B1").unwrap();
        assert_eq!(result.records[0].model, "CORSA");
    }

    #[test]
    fn test_no_field_merging() {
        let with_model = raw(VIN_A, SourceKind::Tabular, None, Some("208"));
        let with_brand = raw(VIN_A, SourceKind::Image, Some("PEUGEOT"), None);
        let result = reconciler().reconcile(&[with_model, with_brand], "B1").unwrap();
        assert_eq!(result.records[0].brand_code, "PEUG");
        assert_eq!(result.records[0].model, "");
    }

    #[test]
    fn test_invalid_identifiers_dropped() {
        let records = vec![
            raw("VF38AHNZP8L12345", SourceKind::Tabular, Some("PEUG"), None),
            raw("VF38AHNZP8L12345O", SourceKind::Tabular, Some("PEUG"), None),
            raw(VIN_B, SourceKind::FreeText, None, None),
        ];
        let result = reconciler().reconcile(&records, "B1").unwrap();
        assert_eq!(result.invalid_dropped, 2);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].brand_code, UNKNOWN_BRAND);
    }

    #[test]
    fn test_batch_ref_attached_and_required() {
        let records = vec![
            raw(VIN_A, SourceKind::Tabular, None, None),
            raw(VIN_B, SourceKind::Tabular, None, None),
        ];
        let result = reconciler().reconcile(&records, " 16102026HOD ").unwrap();
        assert!(result.records.iter().all(|r| r.batch_ref == "16102026HOD"));
        assert_eq!(
            reconciler().reconcile(&records, "  ").unwrap_err(),
            ReconcileError::EmptyBatchRef
        );
    }

    #[test]
    fn test_first_seen_order_kept() {
        let records = vec![
            raw(VIN_B, SourceKind::FreeText, None, None),
            raw(VIN_A, SourceKind::Tabular, None, None),
            raw(VIN_B, SourceKind::Tabular, Some("OPEL"), None),
        ];
        let result = reconciler().reconcile(&records, "B1").unwrap();
        let vins: Vec<&str> = result.records.iter().map(|r| r.vin.as_str()).collect();
        assert_eq!(vins, vec![VIN_B, VIN_A]);
    }

    proptest! {
        #[test]
        fn prop_vins_unique(picks in proptest::collection::vec((0usize..3, 0usize..3, any::<bool>()), 0..30)) {
            let vins = [VIN_A, VIN_B, "1HGCM82633A123456"];
            let kinds = [SourceKind::Tabular, SourceKind::Image, SourceKind::FreeText];
            let records: Vec<RawRecord> = picks
                .iter()
                .map(|&(v, k, branded)| raw(vins[v], kinds[k], branded.then_some("FIAT"), None))
                .collect();

            let result = reconciler().reconcile(&records, "B1").unwrap();
            let distinct: HashSet<&str> = result.records.iter().map(|r| r.vin.as_str()).collect();
            prop_assert_eq!(distinct.len(), result.records.len());
            prop_assert_eq!(result.records.len() + result.duplicates_resolved, records.len());
        }

        #[test]
        fn prop_known_brand_survives(unknown_first in any::<bool>()) {
            let unknown = raw(VIN_A, SourceKind::Tabular, None, None);
            let known = raw(VIN_A, SourceKind::FreeText, Some("JEEP"), None);
            let records = if unknown_first { vec![unknown, known] } else { vec![known, unknown] };
            let result = reconciler().reconcile(&records, "B1").unwrap();
            prop_assert_eq!(result.records[0].brand_code.as_str(), "JEEP");
        }
    }
}
