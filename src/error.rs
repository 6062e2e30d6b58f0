//! Error types for settings loading

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Pseudo-key reported when the document as a whole is unusable
pub const DOCUMENT_KEY: &str = "<document>";

/// Settings load errors.
///
/// Every variant is fatal to the load; there is no degraded mode.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file could not be opened or read
    #[error("Settings source not found: {path}: {source}")]
    SourceNotFound {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Required key absent, or its value has the wrong shape
    #[error("Schema violation at '{key}': {reason}")]
    SchemaViolation {
        /// Offending setting name
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// Sensor count outside {1, 2}
    #[error("Unsupported sensor count {value}: num_of_laser must be 1 or 2")]
    UnsupportedSensorCount {
        /// Value found in the document
        value: i64,
    },

    /// Loaded configuration could not be written back out as YAML
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

impl ConfigError {
    /// Build a schema violation for `key`
    pub fn schema(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::SchemaViolation {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Build a schema violation for a missing key
    pub fn missing(key: impl Into<String>) -> Self {
        Self::schema(key, "required key is missing")
    }

    /// Key named by a schema violation, if this is one
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::SchemaViolation { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::schema(DOCUMENT_KEY, e.to_string())
    }
}
