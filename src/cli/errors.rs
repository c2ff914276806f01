//! CLI-specific error types
//!
//! These end the process. Failures of individual shell requests are
//! reported as error responses instead.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Engine(#[from] crate::Error),
}

impl CliError {
    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        match self {
            CliError::Config(_) => "DOCVAULT_CLI_CONFIG_ERROR",
            CliError::Io(_) => "DOCVAULT_CLI_IO_ERROR",
            CliError::Json(_) => "DOCVAULT_CLI_JSON_ERROR",
            CliError::Engine(e) => e.code(),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
