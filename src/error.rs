//! Unified error type hierarchy for Flavor Icons
//!
//! Provides structured error handling with PatchError (descriptor patching and
//! backups) and ConfigError (run configuration loading and validation).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Descriptor patching errors.
///
/// Not-found and ambiguous variants describe a single target (one scheme, one
/// configuration) and never abort the remaining targets of a file. The I/O,
/// backup and malformed variants are fatal for the file being processed only.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Required element '{element}' not found in {}", path.display())]
    StructuralNotFound { path: PathBuf, element: String },

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Ambiguous match for '{key}': {candidates} candidate sections")]
    AmbiguousMatch { key: String, candidates: usize },

    #[error("Malformed descriptor: {0}")]
    Malformed(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Backup failed for {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid regex pattern: {0}")]
    RegexInvalid(String),
}

impl PatchError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error stops processing of the current file.
    pub fn is_fatal_for_file(&self) -> bool {
        matches!(
            self,
            PatchError::Io { .. }
                | PatchError::Backup { .. }
                | PatchError::Malformed(_)
                | PatchError::StructuralNotFound { .. }
        )
    }
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Result type for patching operations
pub type PatchResult<T> = std::result::Result<T, PatchError>;
