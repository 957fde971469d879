//! VIN Validator

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Number of characters in a vehicle identification number
pub const VIN_LENGTH: usize = 17;

/// Trailing characters that must be digits under the strict policy
const SERIAL_DIGITS: usize = 6;

/// Validation policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VinPolicy {
    /// Require the last six characters (production serial) to be digits
    #[serde(default)]
    pub strict_serial: bool,
}

/// Outcome of checking a single candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VinCheck {
    /// Whether the candidate is a valid VIN
    pub valid: bool,
    /// Candidate uppercased with whitespace removed
    pub normalized: String,
    /// Rejection reason when invalid
    pub error: Option<ValidationError>,
}

impl VinCheck {
    fn pass(normalized: String) -> Self {
        Self {
            valid: true,
            normalized,
            error: None,
        }
    }

    fn fail(normalized: String, error: ValidationError) -> Self {
        Self {
            valid: false,
            normalized,
            error: Some(error),
        }
    }
}

/// Whether `c` belongs to the VIN alphabet (digits and A-Z without I, O, Q)
pub fn is_vin_char(c: char) -> bool {
    c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'))
}

/// Strip whitespace and the `-`/`.` separators people type into identifier cells
pub fn clean_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .flat_map(char::to_uppercase)
        .collect()
}

/// A cell that could hold an identifier: non-empty and purely alphanumeric once cleaned
pub fn is_plausible_identifier(raw: &str) -> bool {
    let cleaned = clean_identifier(raw);
    !cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_alphanumeric())
}

/// VIN validator
#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: VinPolicy,
}

impl Validator {
    /// Create a new validator with the given policy
    pub fn new(policy: VinPolicy) -> Self {
        Self { policy }
    }

    /// Normalize and classify a candidate. Never fails; rejection is reported in the result.
    pub fn check(&self, candidate: &str) -> VinCheck {
        let normalized: String = candidate
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();

        if normalized.is_empty() {
            return VinCheck::fail(normalized, ValidationError::Empty);
        }

        let length = normalized.chars().count();
        if length != VIN_LENGTH {
            return VinCheck::fail(normalized, ValidationError::InvalidLength(length));
        }

        if let Some((position, character)) =
            normalized.chars().enumerate().find(|(_, c)| !is_vin_char(*c))
        {
            return VinCheck::fail(
                normalized,
                ValidationError::InvalidCharacter {
                    character,
                    position,
                },
            );
        }

        if self.policy.strict_serial {
            let serial = &normalized[VIN_LENGTH - SERIAL_DIGITS..];
            if !serial.chars().all(|c| c.is_ascii_digit()) {
                let serial = serial.to_string();
                return VinCheck::fail(normalized, ValidationError::NonNumericSerial(serial));
            }
        }

        VinCheck::pass(normalized)
    }

    /// Validate a candidate, returning its normalized form
    pub fn validate(&self, candidate: &str) -> Result<String, ValidationError> {
        let check = self.check(candidate);
        match check.error {
            None => Ok(check.normalized),
            Some(err) => Err(err),
        }
    }

    /// Whether the candidate is a valid VIN
    pub fn is_valid(&self, candidate: &str) -> bool {
        self.check(candidate).valid
    }
}
