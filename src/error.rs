//! Error types for the emulator.
//!
//! Only construction and collaborator failures surface as errors. The transient
//! conditions of a production step (pacing, full output queue, page starvation) are
//! reported as [`StepOutcome::Declined`](crate::StepOutcome) instead, since a
//! scheduler is expected to see them on most invocations.
//!
//! ## Error Categories
//!
//! - **Configuration Errors**: invalid or inconsistent equipment parameters
//! - **Config File Errors**: the configuration file could not be read or parsed
//! - **Page Source Errors**: the external page pool failed to hand out a page
//! - **Header Errors**: a packet header could not be decoded from page bytes
//!
//! ```rust
//! use cru_emulator::EmulatorError;
//!
//! let error = EmulatorError::page_source("pool shut down");
//! assert!(error.is_retryable());
//!
//! let error = EmulatorError::config("cruBlockSize", "must exceed the header size");
//! assert!(!error.is_retryable());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for emulator operations.
pub type Result<T, E = EmulatorError> = std::result::Result<T, E>;

/// Main error type for emulator operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EmulatorError {
    #[error("Invalid configuration for '{key}': {reason}")]
    Config { key: String, reason: String },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {details}")]
    ConfigParse {
        details: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Page source failed: {reason}")]
    PageSource {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Header decode error at byte {offset}: {details}")]
    Header { offset: usize, details: String },
}

impl EmulatorError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmulatorError::PageSource { .. } => true,
            EmulatorError::Config { .. } => false,
            EmulatorError::ConfigFile { .. } => false,
            EmulatorError::ConfigParse { .. } => false,
            EmulatorError::Header { .. } => false,
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        EmulatorError::Config { key: key.into(), reason: reason.into() }
    }

    /// Helper constructor for configuration file errors with path context.
    pub fn config_file(path: PathBuf, source: std::io::Error) -> Self {
        EmulatorError::ConfigFile { path, source }
    }

    /// Helper constructor for page source failures.
    pub fn page_source(reason: impl Into<String>) -> Self {
        EmulatorError::PageSource { reason: reason.into(), source: None }
    }

    /// Helper constructor for page source failures with source.
    pub fn page_source_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        EmulatorError::PageSource { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for header decode errors.
    pub fn header(offset: usize, details: impl Into<String>) -> Self {
        EmulatorError::Header { offset, details: details.into() }
    }
}

impl From<serde_yaml_ng::Error> for EmulatorError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        EmulatorError::ConfigParse { details: err.to_string(), source: Some(Box::new(err)) }
    }
}
