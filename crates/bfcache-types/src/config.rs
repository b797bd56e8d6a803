//! Session-history configuration.
//!
//! Loaded from TOML. Every key is optional; missing keys fall back to the
//! defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};

/// Back/forward cache settings (`[page_cache]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCacheConfig {
    /// Master switch for caching pages on navigation.
    #[serde(default = "yes")]
    pub enabled: bool,
    /// Maximum number of cached pages.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Lifetime of a cached page, in seconds.
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            expiration_secs: default_expiration_secs(),
        }
    }
}

/// Top-level history configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of back/forward entries.
    #[serde(default = "default_list_capacity")]
    pub back_forward_list_capacity: usize,
    /// Forward push/replace/reactivation events to the Navigation API.
    #[serde(default = "yes")]
    pub navigation_api_enabled: bool,
    /// Private browsing: suppresses global history and visited links.
    #[serde(default)]
    pub uses_ephemeral_session: bool,
    /// Re-enables history recording inside an ephemeral session.
    #[serde(default)]
    pub allow_privacy_sensitive_operations_in_ephemeral_session: bool,
    #[serde(default)]
    pub page_cache: PageCacheConfig,
}

fn yes() -> bool {
    true
}
fn default_cache_capacity() -> usize {
    3
}
fn default_expiration_secs() -> u64 {
    30 * 60
}
fn default_list_capacity() -> usize {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            back_forward_list_capacity: default_list_capacity(),
            navigation_api_enabled: true,
            uses_ephemeral_session: false,
            allow_privacy_sensitive_operations_in_ephemeral_session: false,
            page_cache: PageCacheConfig::default(),
        }
    }
}

impl HistoryConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        log::debug!("loading history config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Lifetime applied to a cached page when it is created.
    pub fn page_cache_expiration(&self) -> Duration {
        Duration::from_secs(self.page_cache.expiration_secs)
    }

    /// Whether pages may be cached at all.
    pub fn page_cache_usable(&self) -> bool {
        self.page_cache.enabled && self.page_cache.capacity > 0
    }

    fn validate(&self) -> Result<()> {
        if self.back_forward_list_capacity == 0 {
            return Err(HistoryError::Config(
                "back_forward_list_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
