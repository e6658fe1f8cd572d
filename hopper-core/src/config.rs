//! Aggregate configuration, loadable from TOML.
//!
//! ```toml
//! listing_url = "https://games.example.com/v1/games/123/servers/Public"
//!
//! [eligibility]
//! slack = 4
//!
//! [selector]
//! cooldown_ttl_secs = 450
//! max_pass_attempts = 500
//!
//! [polling]
//! max_pages = 50
//!
//! [polling.retry]
//! backoff = "fixed"
//! ```
//!
//! Every section and field is optional; missing values take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::eligibility::EligibilityPolicy;
use crate::error::ConfigError;
use crate::selector::SelectorConfig;
use crate::source::PollingConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HopperConfig {
    /// Upstream listing endpoint used when a request carries no batch
    pub listing_url: Option<String>,
    pub eligibility: EligibilityPolicy,
    pub selector: SelectorConfig,
    pub polling: PollingConfig,
}

impl HopperConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use crate::selector::ExclusionMode;
    use crate::source::SortStrategy;

    #[test]
    fn empty_file_yields_defaults() {
        let config = HopperConfig::from_toml_str("").unwrap();
        assert_eq!(config, HopperConfig::default());
        assert_eq!(config.selector.cooldown_ttl_secs, 450);
        assert_eq!(config.polling.max_pages, 50);
    }

    #[test]
    fn nested_sections_override_defaults() {
        let config = HopperConfig::from_toml_str(
            r#"
            listing_url = "https://example.com/servers"

            [eligibility]
            slack = 4
            filter_status = false

            [selector]
            max_pass_attempts = 500
            exclusion = "snapshot"

            [polling]
            sort = "descending"

            [polling.retry]
            backoff = "fixed"
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.listing_url.as_deref(), Some("https://example.com/servers"));
        assert_eq!(config.eligibility.slack, 4);
        assert!(!config.eligibility.filter_status);
        assert!(config.eligibility.exclude_empty);
        assert_eq!(config.selector.max_pass_attempts, 500);
        assert_eq!(config.selector.exclusion, ExclusionMode::Snapshot);
        assert_eq!(config.selector.cooldown_ttl_secs, 450);
        assert_eq!(config.polling.sort, SortStrategy::Descending);
        assert_eq!(config.polling.retry.backoff, Backoff::Fixed);
        assert_eq!(config.polling.retry.max_attempts, 3);
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let err = HopperConfig::from_toml_str("[polling]\nsort = \"sideways\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = HopperConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
