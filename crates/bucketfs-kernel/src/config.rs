//! Filesystem configuration.
//!
//! Loaded from TOML. Every field is optional; missing fields fall back to
//! the values in [`constants`](crate::constants).
//!
//! ```toml
//! debounce_ms = 1000
//! quiescence_ms = 5
//! hydrate_concurrency = 20
//! max_queue = 100
//! max_attempts = 3
//! request_timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    EVENT_QUIESCENCE, HYDRATE_CONCURRENCY, MAX_PENDING_OPS, MAX_WRITEBACK_ATTEMPTS,
    REQUEST_TIMEOUT, WRITEBACK_DEBOUNCE,
};
use crate::writeback::WriteBackSettings;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for a [`MemFs`](crate::MemFs) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Write-back debounce, in milliseconds.
    pub debounce_ms: u64,
    /// Change-event batching window, in milliseconds.
    pub quiescence_ms: u64,
    /// Concurrent content fetches during hydration.
    pub hydrate_concurrency: usize,
    /// Maximum distinct paths in the write-back queue.
    pub max_queue: usize,
    /// Write-back attempts before an operation is dead-lettered.
    pub max_attempts: u32,
    /// Remote request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            debounce_ms: WRITEBACK_DEBOUNCE.as_millis() as u64,
            quiescence_ms: EVENT_QUIESCENCE.as_millis() as u64,
            hydrate_concurrency: HYDRATE_CONCURRENCY,
            max_queue: MAX_PENDING_OPS,
            max_attempts: MAX_WRITEBACK_ATTEMPTS,
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl FsConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: FsConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Reject values that would stall hydration or write-back.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hydrate_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "hydrate_concurrency must be at least 1".into(),
            ));
        }
        if self.max_queue == 0 {
            return Err(ConfigError::Invalid("max_queue must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Write-back queue settings derived from this config.
    pub fn writeback(&self) -> WriteBackSettings {
        WriteBackSettings {
            debounce: self.debounce(),
            max_queue: self.max_queue,
            max_attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_constants() {
        let config = FsConfig::default();
        assert_eq!(config.debounce(), WRITEBACK_DEBOUNCE);
        assert_eq!(config.quiescence(), EVENT_QUIESCENCE);
        assert_eq!(config.hydrate_concurrency, 20);
        assert_eq!(config.max_queue, 100);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FsConfig::from_toml_str("debounce_ms = 250\nmax_queue = 8\n").unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.max_queue, 8);
        assert_eq!(config.hydrate_concurrency, HYDRATE_CONCURRENCY);
        assert_eq!(config.max_attempts, MAX_WRITEBACK_ATTEMPTS);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(FsConfig::from_toml_str("").unwrap(), FsConfig::default());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = FsConfig::from_toml_str("hydrate_concurrency = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = FsConfig::from_toml_str("debounce_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_attempts = 5").unwrap();
        let config = FsConfig::load(file.path()).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.writeback().max_attempts, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = FsConfig::load("/nonexistent/bucketfs.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
