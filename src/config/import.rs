//! Business tunables loaded from config.toml.
//!
//! The one rule that genuinely varies between deployments is the legacy
//! default-company workaround: pump exports predating fleet categorization
//! were all booked on one company, so fuel drawn by that company's
//! uncategorized vehicles is treated as unallocated. Sites that never had
//! the legacy data disable the rule by setting the name to an empty string.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    /// Import behavior tunables
    pub import: ImportConfig,
    /// Tank defaults applied when a profile has no stored setting
    pub tank: TankConfig,
}

/// Import behavior tunables
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportConfig {
    /// Company whose uncategorized vehicles get their fuel booked as
    /// unallocated. Empty string disables the rule.
    pub legacy_default_company: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            legacy_default_company: "TRANSGAT-SORT".to_string(),
        }
    }
}

impl ImportConfig {
    /// The legacy company name, or None when the rule is disabled.
    #[must_use]
    pub fn legacy_company(&self) -> Option<&str> {
        let name = self.legacy_default_company.trim();
        if name.is_empty() { None } else { Some(name) }
    }
}

/// Tank defaults applied when a profile has no stored setting
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TankConfig {
    /// Total depot capacity in liters
    pub capacity: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self { capacity: 27000.0 }
    }
}

/// Loads tunables from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML syntax is invalid.
/// A missing file is not an error; callers that treat it as optional use
/// [`load_or_default`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads tunables from the default location (./config.toml), falling back to
/// the built-in defaults when the file does not exist.
#[must_use]
pub fn load_or_default() -> Config {
    if Path::new("config.toml").exists() {
        load_config("config.toml").unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable config.toml: {e}");
            Config::default()
        })
    } else {
        Config::default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [import]
            legacy_default_company = "VECHI-TRANS"

            [tank]
            capacity = 18000.0
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.import.legacy_company(), Some("VECHI-TRANS"));
        assert_eq!(config.tank.capacity, 18000.0);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.import.legacy_company(), Some("TRANSGAT-SORT"));
        assert_eq!(config.tank.capacity, 27000.0);
    }

    #[test]
    fn test_empty_name_disables_rule() {
        let toml_str = r#"
            [import]
            legacy_default_company = ""
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.import.legacy_company(), None);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = toml::from_str::<Config>("import = 3").unwrap_err();
        assert!(err.to_string().contains("import"));
    }
}
