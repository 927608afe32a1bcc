//! TOML configuration for the verifier.
//!
//! All knobs have serde defaults, so an empty file (or no file) yields a
//! working verifier pointed at Cloudflare's DoH endpoint.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// File contents were not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunable parameters of a verification run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// DNS-over-HTTPS endpoint queried for TXT records
    #[serde(default = "default_doh_endpoint")]
    pub doh_endpoint: String,
    /// Hard timeout for one DoH request, seconds
    #[serde(default = "default_doh_timeout_secs")]
    pub doh_timeout_secs: u64,
    /// Max verification attempts per window per domain
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,
    /// Rate limit window length, seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    /// Forward clock tolerance for claim timestamps, seconds
    #[serde(default = "default_clock_skew_tolerance_secs")]
    pub clock_skew_tolerance_secs: i64,
    /// Validity synthesized for legacy records without expiration, days
    #[serde(default = "default_legacy_validity_days")]
    pub legacy_validity_days: i64,
}

fn default_doh_endpoint() -> String {
    "https://cloudflare-dns.com/dns-query".to_string()
}

fn default_doh_timeout_secs() -> u64 {
    10
}

fn default_rate_limit_max() -> u32 {
    crate::ratelimit::DEFAULT_MAX_PER_WINDOW
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_clock_skew_tolerance_secs() -> i64 {
    300
}

fn default_legacy_validity_days() -> i64 {
    90
}

impl Default for VerifierConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize from defaults")
    }
}

impl VerifierConfig {
    /// Load from a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file is unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// DoH request timeout as a [`Duration`]
    #[must_use]
    pub fn doh_timeout(&self) -> Duration {
        Duration::from_secs(self.doh_timeout_secs)
    }

    /// Rate limit window as a [`Duration`]
    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Legacy validity window in seconds
    #[must_use]
    pub fn legacy_validity_secs(&self) -> i64 {
        self.legacy_validity_days * 24 * 60 * 60
    }
}
