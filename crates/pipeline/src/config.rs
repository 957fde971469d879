//! Run configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `VDAT_`-prefixed environment variables
//! (`VDAT_RUN__BATCH_REF=...`, `VDAT_SCAN__GAMMA=1.8`).

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use header_hunter::HunterConfig;
use scan_extractor::ScanConfig;
use serde::{Deserialize, Serialize};

/// Per-run parameters chosen by the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Customer display name or code, tags the export
    pub customer: String,
    /// Port of arrival display name or code, tags the export
    pub poa: String,
    /// Voyage/batch tag; defaults to DDMMYYYY + customer code
    pub batch_ref: Option<String>,
    /// Brand applied to image and free-text records that name none
    pub fallback_brand: Option<String>,
    /// Model applied to image and free-text records that name none
    pub fallback_model: Option<String>,
    /// Require a numeric four-digit production serial
    pub strict_serial: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            customer: "Hoedlmayr".to_string(),
            poa: "Grimsby".to_string(),
            batch_ref: None,
            fallback_brand: None,
            fallback_model: None,
            strict_serial: false,
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run: RunSettings,
    pub hunter: HunterConfig,
    pub scan: ScanConfig,
    /// Extra brand aliases (alias -> code) added to the built-in table
    pub brands: BTreeMap<String, String>,
}

impl RunConfig {
    /// Load defaults, an optional TOML file and `VDAT_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&RunConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("VDAT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document on top of the defaults, without environment overrides
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&RunConfig::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config.run.customer, "Hoedlmayr");
        assert_eq!(config.run.batch_ref, None);
        assert_eq!(config.hunter.scan_limit, 50);
        assert_eq!(config.scan.max_corrections, 2);
        assert_eq!(config.scan.recognition_timeout_secs, 60);
        assert!(config.brands.is_empty());
    }

    #[test]
    fn test_toml_overrides() {
        let config = RunConfig::from_toml(
            r#"
            [run]
            customer = "INEOS"
            poa = "Emden"
            fallback_brand = "INEOS"

            [scan]
            gamma = 2.0
            language = "deu"

            [brands]
            VAUXHALL = "OPEL"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.customer, "INEOS");
        assert_eq!(config.run.fallback_brand.as_deref(), Some("INEOS"));
        assert_eq!(config.scan.gamma, 2.0);
        assert_eq!(config.scan.language, "deu");
        assert_eq!(config.scan.chroma_threshold, 60);
        let vauxhall = config
            .brands
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case("vauxhall"))
            .map(|(_, code)| code.as_str());
        assert_eq!(vauxhall, Some("OPEL"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[hunter]\nscan_limit = 10\n\n[run]\nbatch_ref = \"V123\"").unwrap();

        let config = RunConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.hunter.scan_limit, 10);
        assert_eq!(config.hunter.min_keyword_matches, 2);
        assert_eq!(config.run.batch_ref.as_deref(), Some("V123"));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(RunConfig::load(Some(Path::new("/nonexistent/vdat.toml"))).is_err());
    }
}
