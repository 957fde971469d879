//! Header Hunter configuration

use serde::{Deserialize, Serialize};

/// Header detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HunterConfig {
    /// Rows scanned from the top of each sheet when looking for the header
    pub scan_limit: usize,

    /// Distinct keyword cells a header row needs, the identifier cell included
    pub min_keyword_matches: usize,
}

impl Default for HunterConfig {
    fn default() -> Self {
        Self {
            scan_limit: 50,
            min_keyword_matches: 2,
        }
    }
}
