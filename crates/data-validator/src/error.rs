//! Validation Error Types

use thiserror::Error;

/// Reasons a candidate string is not a VIN
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Nothing left after normalization
    #[error("Identifier is empty")]
    Empty,

    /// Wrong number of characters
    #[error("Invalid length: expected 17 characters, got {0}")]
    InvalidLength(usize),

    /// Character outside the VIN alphabet
    #[error("Character '{character}' at position {position} is not allowed in a VIN")]
    InvalidCharacter { character: char, position: usize },

    /// Serial suffix is not numeric (strict policy only)
    #[error("Serial suffix not numeric: {0}")]
    NonNumericSerial(String),
}
