//! Flavor Icons
//!
//! Patches Xcode build descriptors so that every product flavor compiles with
//! its own app-icon asset set.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Flavor mapping, per-target results and the run summary
//! - **config**: Run configuration loading and validation
//! - **patcher**: Backups, section location, key editing and the two
//!   descriptor patchers (scheme and project)
//! - **log_collector**: `log` backend writing to stderr and an optional file

// Core foundational modules
pub mod error;
pub mod models;

pub mod config;
pub mod log_collector;
pub mod patcher;

// Re-export the log crate for macro usage
pub use log;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{ConfigError, PatchError, PatchResult};

pub use models::{
    EditOutcome, FileReport, FlavorMapping, PatchSummary, TargetReport, TargetStatus,
};

pub use config::{FlavorEntry, PatcherConfig};

pub use patcher::{
    BackupHandle, BackupStore, DescriptorFile, DescriptorPatcher, ProjectPatcher, SchemePatcher,
    SchemeTarget,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
