//! Data Validation and Normalization
//!
//! Provides VIN validation, brand/model canonicalization and the record
//! types shared by every manifest extractor.

mod error;
mod normalizer;
mod record;
mod validator;

pub use error::ValidationError;
pub use normalizer::{
    collapse_whitespace, BrandMapping, Normalizer, PrefixRule, UNKNOWN_BRAND,
};
pub use record::{CanonicalRecord, Confidence, Fallback, RawRecord, SourceKind};
pub use validator::{
    clean_identifier, is_plausible_identifier, is_vin_char, Validator, VinCheck, VinPolicy,
    VIN_LENGTH,
};
