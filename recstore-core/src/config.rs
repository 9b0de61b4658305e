//! Store configuration

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError, StoreResult};

/// Store-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Largest number of ids sent in one `find_many` call.
    pub max_coalesced_ids: usize,
    /// Emit a warning when an adapter answers with a different id.
    pub warn_on_id_mismatch: bool,
    /// Background-reload cached records when neither the find options nor
    /// the adapter decide.
    pub background_reload_default: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_coalesced_ids: 100,
            warn_on_id_mismatch: true,
            background_reload_default: false,
        }
    }
}

impl StoreConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_coalesced_ids(mut self, max: usize) -> Self {
        self.max_coalesced_ids = max;
        self
    }

    pub fn with_id_mismatch_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_id_mismatch = enabled;
        self
    }

    pub fn with_background_reload(mut self, enabled: bool) -> Self {
        self.background_reload_default = enabled;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `RECSTORE_MAX_COALESCED_IDS`: ids per `find_many` call (default: 100)
    /// - `RECSTORE_WARN_ON_ID_MISMATCH`: `true`/`false` (default: true)
    /// - `RECSTORE_BACKGROUND_RELOAD`: `true`/`false` (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_coalesced_ids: std::env::var("RECSTORE_MAX_COALESCED_IDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_coalesced_ids),
            warn_on_id_mismatch: std::env::var("RECSTORE_WARN_ON_ID_MISMATCH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.warn_on_id_mismatch),
            background_reload_default: std::env::var("RECSTORE_BACKGROUND_RELOAD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.background_reload_default),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_coalesced_ids == 0 {
            return Err(StoreError::Config(ConfigError::InvalidValue {
                field: "max_coalesced_ids".to_string(),
                value: self.max_coalesced_ids.to_string(),
                reason: "max_coalesced_ids must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }
}
