//! Descriptor backups taken before the first mutation.
//!
//! A backup lives next to its descriptor as `<path><suffix>` (for example
//! `project.pbxproj.backup`). The first snapshot wins: once a backup exists
//! for a suffix it is never overwritten, so re-running the patcher cannot
//! replace pristine content with already-patched content. Backups are never
//! deleted by this crate.

use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::PatchError;
use super::{write_atomic, PatchResult};

pub const DEFAULT_BACKUP_SUFFIX: &str = ".backup";

/// Handle to a backup of one descriptor file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub original: PathBuf,
    pub backup: PathBuf,
    /// True when this call created the backup, false when it already existed
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupStore {
    suffix: String,
}

impl Default for BackupStore {
    fn default() -> Self {
        BackupStore::new(DEFAULT_BACKUP_SUFFIX)
    }
}

impl BackupStore {
    pub fn new(suffix: impl Into<String>) -> Self {
        BackupStore {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// `<path><suffix>`, appended to the full file name
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    /// Handle for an existing backup of `path`, if any
    pub fn existing(&self, path: &Path) -> Option<BackupHandle> {
        let backup = self.backup_path(path);
        if backup.is_file() {
            Some(BackupHandle {
                original: path.to_path_buf(),
                backup,
                created: false,
            })
        } else {
            None
        }
    }

    /// Copy the current bytes of `path` to its backup path, unless a backup
    /// with this suffix already exists.
    pub fn snapshot(&self, path: &Path) -> PatchResult<BackupHandle> {
        if let Some(handle) = self.existing(path) {
            log::debug!(
                "[Backup] Keeping existing backup {}",
                handle.backup.display()
            );
            return Ok(handle);
        }

        let bytes = fs::read(path).map_err(|e| PatchError::Backup {
            path: path.to_path_buf(),
            source: e,
        })?;
        let backup = self.backup_path(path);
        let created = write_new(&backup, &bytes)?;

        if created {
            log::info!("[Backup] Created {}", backup.display());
        }
        Ok(BackupHandle {
            original: path.to_path_buf(),
            backup,
            created,
        })
    }

    /// Copy backup bytes back over the live file.
    pub fn restore(&self, handle: &BackupHandle) -> PatchResult<()> {
        let bytes = fs::read(&handle.backup).map_err(|e| PatchError::Backup {
            path: handle.backup.clone(),
            source: e,
        })?;
        write_atomic(&handle.original, &bytes)?;
        log::info!(
            "[Backup] Restored {} from {}",
            handle.original.display(),
            handle.backup.display()
        );
        Ok(())
    }

    /// Restore `path` from its backup with this store's suffix.
    pub fn restore_path(&self, path: &Path) -> PatchResult<BackupHandle> {
        let handle = self.existing(path).ok_or_else(|| PatchError::Backup {
            path: self.backup_path(path),
            source: std::io::Error::new(ErrorKind::NotFound, "no backup to restore from"),
        })?;
        self.restore(&handle)?;
        Ok(handle)
    }
}

/// Write `bytes` to `path` only if nothing is there yet. Returns false when
/// another writer got there first. Anything at `path` that is not a regular
/// file is an error.
fn write_new(path: &Path, bytes: &[u8]) -> PatchResult<bool> {
    let backup_err = |e| PatchError::Backup {
        path: path.to_path_buf(),
        source: e,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(backup_err)?;
    tmp.write_all(bytes).map_err(backup_err)?;
    tmp.as_file().sync_all().map_err(backup_err)?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists && path.is_file() => Ok(false),
        Err(e) => Err(backup_err(e.error)),
    }
}
