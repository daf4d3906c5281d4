//! Sync store configuration.
//!
//! # Responsibility
//! - Load store settings from JSON (file or string) with defaults.
//! - Validate settings before any collaborator is touched.
//!
//! # Invariants
//! - `collection` is non-empty and contains no `/`.
//! - `log_level` is one of `trace|debug|info|warn|error` after normalization.

use crate::logging::{default_log_level, normalize_level};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default remote collection holding one document per identity.
pub const DEFAULT_COLLECTION: &str = "users";

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    InvalidCollection(String),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidCollection(value) => write!(f, "invalid collection name: `{value}`"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidCollection(_) | Self::InvalidLogLevel(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Runtime settings for one sync store instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Remote collection name; documents live at `<collection>/<uid>`.
    pub collection: String,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Parses and validates configuration from a JSON string.
    ///
    /// Missing keys fall back to `StoreConfig::default()` values.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(raw)?;
        config.validated()
    }

    /// Reads and validates configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Returns a normalized copy, or the first validation failure.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let collection = self.collection.trim();
        if collection.is_empty() || collection.contains('/') {
            return Err(ConfigError::InvalidCollection(self.collection));
        }
        self.collection = collection.to_string();
        self.log_level = normalize_level(&self.log_level)
            .map_err(|err| ConfigError::InvalidLogLevel(err.to_string()))?
            .to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig, DEFAULT_COLLECTION};

    #[test]
    fn empty_object_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").expect("defaults should validate");
        assert_eq!(config.collection, DEFAULT_COLLECTION);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn normalizes_collection_and_level() {
        let config =
            StoreConfig::from_json_str(r#"{"collection": " planners ", "log_level": "WARNING"}"#)
                .expect("config should validate");
        assert_eq!(config.collection, "planners");
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn rejects_nested_collection_path() {
        let err = StoreConfig::from_json_str(r#"{"collection": "users/extra"}"#)
            .expect_err("slash must be rejected");
        assert!(matches!(err, ConfigError::InvalidCollection(_)));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_levels() {
        let unknown = StoreConfig::from_json_str(r#"{"colection": "users"}"#)
            .expect_err("unknown key must be rejected");
        assert!(matches!(unknown, ConfigError::Parse(_)));

        let level = StoreConfig::from_json_str(r#"{"log_level": "loud"}"#)
            .expect_err("unsupported level must be rejected");
        assert!(matches!(level, ConfigError::InvalidLogLevel(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = StoreConfig::load(dir.path().join("absent.json")).expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
