//! Query engine configuration.
//!
//! Loading is lenient: a missing section yields [`QueryConfig::default`], while a
//! present but malformed section is an [`Error::Config`].
//!
//! ```yaml
//! odata:
//!   on_filter_error: propagate
//!   limits:
//!     max_nodes: 500
//!     max_top: 100
//! ```

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::limits::ODataLimits;

/// What the filter stage does with a `$filter` that fails to parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFilterError {
    /// Log a warning and return the collection unfiltered.
    #[default]
    Ignore,
    /// Return [`Error::InvalidFilter`] to the caller.
    Propagate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub on_filter_error: OnFilterError,
    pub limits: ODataLimits,
}

impl QueryConfig {
    /// Default limits with parse errors propagated to the caller.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            on_filter_error: OnFilterError::Propagate,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_on_filter_error(mut self, policy: OnFilterError) -> Self {
        self.on_filter_error = policy;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ODataLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Extract the section at `key` (dot-separated) from a figment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the section exists but cannot be deserialized.
    pub fn from_figment(figment: &Figment, key: &str) -> Result<Self, Error> {
        if !figment.contains(key) {
            tracing::debug!(key, "no OData query config section, using defaults");
            return Ok(Self::default());
        }
        figment
            .extract_inner(key)
            .map_err(|e| Error::Config(format!("section '{key}': {e}")))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::providers::{Format, Serialized, Yaml};
    use serde_json::json;

    #[test]
    fn test_missing_section_uses_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(json!({"other": {"x": 1}})));
        let config = QueryConfig::from_figment(&figment, "odata").unwrap();
        assert_eq!(config, QueryConfig::default());
        assert_eq!(config.on_filter_error, OnFilterError::Ignore);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "odata": {
                "on_filter_error": "propagate",
                "limits": {"max_top": 50}
            }
        })));
        let config = QueryConfig::from_figment(&figment, "odata").unwrap();
        assert_eq!(config.on_filter_error, OnFilterError::Propagate);
        assert_eq!(config.limits.max_top, Some(50));
        assert_eq!(config.limits.max_nodes, 2000);
    }

    #[test]
    fn test_nested_key_from_yaml() {
        let yaml = r"
server:
  odata:
    limits:
      max_depth: 8
";
        let figment = Figment::new().merge(Yaml::string(yaml));
        let config = QueryConfig::from_figment(&figment, "server.odata").unwrap();
        assert_eq!(config.limits.max_depth, 8);
        assert_eq!(config.on_filter_error, OnFilterError::Ignore);
    }

    #[test]
    fn test_invalid_section_is_config_error() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "odata": {"on_filter_error": "explode"}
        })));
        let err = QueryConfig::from_figment(&figment, "odata").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("odata")));
    }

    #[test]
    fn test_strict() {
        assert_eq!(
            QueryConfig::strict().on_filter_error,
            OnFilterError::Propagate
        );
    }
}
