//! Engine configuration
//!
//! Loaded from a JSON file or built in-process. Every field has a default,
//! so `{}` is a valid configuration file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

/// Default boundary between the inline and out-of-line tiers.
pub const DEFAULT_INLINE_THRESHOLD: usize = 7950;

/// Default hard maximum encoded document size (32 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 32 * 1024 * 1024;

/// Default maximum nesting depth accepted at document construction.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tuning knobs for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Documents encoding to fewer bytes than this are stored inline
    #[serde(default = "default_inline_threshold")]
    pub inline_threshold_bytes: usize,

    /// Hard maximum encoded document size
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,

    /// Band below the threshold in which an out-of-line document stays
    /// out-of-line while shrinking
    #[serde(default)]
    pub tier_hysteresis_bytes: usize,

    /// Bound on any single out-of-line store operation (none = unbounded)
    #[serde(default)]
    pub out_of_line_timeout_ms: Option<u64>,

    /// Modelled access latency of the out-of-line store
    #[serde(default)]
    pub out_of_line_latency_ms: u64,

    /// Maximum nesting depth of a document tree
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Minimum log severity ("trace", "info", "warn", "error", "fatal")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_inline_threshold() -> usize {
    DEFAULT_INLINE_THRESHOLD
}
fn default_max_document_bytes() -> usize {
    DEFAULT_MAX_DOCUMENT_BYTES
}
fn default_max_nesting_depth() -> usize {
    DEFAULT_MAX_NESTING_DEPTH
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inline_threshold_bytes: DEFAULT_INLINE_THRESHOLD,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            tier_hysteresis_bytes: 0,
            out_of_line_timeout_ms: None,
            out_of_line_latency_ms: 0,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.inline_threshold_bytes == 0 {
            return Err(ConfigError::Invalid(
                "inline_threshold_bytes must be > 0".to_string(),
            ));
        }
        if self.inline_threshold_bytes > self.max_document_bytes {
            return Err(ConfigError::Invalid(format!(
                "inline_threshold_bytes ({}) exceeds max_document_bytes ({})",
                self.inline_threshold_bytes, self.max_document_bytes
            )));
        }
        if self.tier_hysteresis_bytes >= self.inline_threshold_bytes {
            return Err(ConfigError::Invalid(
                "tier_hysteresis_bytes must be smaller than inline_threshold_bytes".to_string(),
            ));
        }
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_nesting_depth must be >= 1".to_string(),
            ));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Unknown log_level: '{}'",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Parsed minimum log severity
    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }

    /// Out-of-line operation bound as a duration
    pub fn out_of_line_timeout(&self) -> Option<Duration> {
        self.out_of_line_timeout_ms.map(Duration::from_millis)
    }

    /// Modelled out-of-line latency as a duration
    pub fn out_of_line_latency(&self) -> Duration {
        Duration::from_millis(self.out_of_line_latency_ms)
    }

    pub fn with_inline_threshold(mut self, bytes: usize) -> Self {
        self.inline_threshold_bytes = bytes;
        self
    }

    pub fn with_max_document_bytes(mut self, bytes: usize) -> Self {
        self.max_document_bytes = bytes;
        self
    }

    pub fn with_hysteresis(mut self, bytes: usize) -> Self {
        self.tier_hysteresis_bytes = bytes;
        self
    }

    pub fn with_out_of_line_timeout(mut self, timeout: Duration) -> Self {
        self.out_of_line_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_out_of_line_latency(mut self, latency: Duration) -> Self {
        self.out_of_line_latency_ms = latency.as_millis() as u64;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.inline_threshold_bytes, 7950);
        assert_eq!(config.max_document_bytes, 32 * 1024 * 1024);
        assert!(config.out_of_line_timeout().is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("{}");
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_overrides() {
        let file = write_config(
            r#"{"inline_threshold_bytes": 100, "out_of_line_timeout_ms": 25, "log_level": "warn"}"#,
        );
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.inline_threshold_bytes, 100);
        assert_eq!(config.out_of_line_timeout(), Some(Duration::from_millis(25)));
        assert_eq!(config.log_severity(), Severity::Warn);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{"inline_treshold": 100}"#);
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_threshold_above_max_rejected() {
        let config = EngineConfig::default()
            .with_inline_threshold(1000)
            .with_max_document_bytes(500);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_hysteresis_must_fit_below_threshold() {
        let config = EngineConfig::default()
            .with_inline_threshold(100)
            .with_hysteresis(100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let config = EngineConfig::default().with_log_level("loud");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = EngineConfig::load(Path::new("/nonexistent/docvault.json"));
        assert!(matches!(result, Err(ConfigError::Read(_))));
    }
}
