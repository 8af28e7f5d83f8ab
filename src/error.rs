//! Error types for runtime bootstrap operations.
//!
//! This module defines [`BootstrapError`], the error type used by stage
//! functions, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Stage functions return `Result<T>`; only [`BootstrapError::Cancelled`]
//!   is expected to travel all the way up through `?`
//! - Failures of external programs are data ([`crate::process::ProcessResult`]),
//!   not errors, so install strategies can fall back on them
//! - The orchestrator converts every error into a `NotReady` result; nothing
//!   escapes to the caller

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for bootstrap operations.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The caller cancelled the operation.
    #[error("cancelled")]
    Cancelled,

    /// An external program could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A setting holds a value that cannot be used.
    #[error("invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    /// Failed to parse a settings file.
    #[error("failed to parse settings at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Bundle archive could not be read or extracted.
    #[error("bundle archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BootstrapError {
    /// Whether this error represents caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BootstrapError::Cancelled)
    }
}

/// Result type alias for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;
