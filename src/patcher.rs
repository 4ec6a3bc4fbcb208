//! Descriptor patching for per-flavor app icons.
//!
//! Two descriptor formats are handled by two patchers sharing one pipeline:
//! read the file fully, compute the new content in memory, snapshot a backup,
//! then write the whole file back atomically. A file whose content did not
//! change is never written, and no backup is taken for it.
//!
//! - [`scheme::SchemePatcher`] edits XML scheme descriptors through a parsed
//!   tree ([`xml_tree`]).
//! - [`project::ProjectPatcher`] edits the brace-delimited project descriptor
//!   as an opaque text arena with located ranges ([`locator`], [`editor`]).

pub mod backup;
pub mod editor;
pub mod locator;
pub mod project;
pub mod scheme;
pub mod xml_tree;

#[cfg(test)]
mod tests;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::PatcherConfig;
use crate::error::PatchError;
use crate::models::{FileReport, FlavorMapping, TargetReport, TargetStatus};

pub use crate::error::PatchResult;
pub use backup::{BackupHandle, BackupStore, DEFAULT_BACKUP_SUFFIX};
pub use project::ProjectPatcher;
pub use scheme::{SchemePatcher, SchemeTarget};

/// A descriptor file held for one edit session.
#[derive(Debug, Clone)]
pub struct DescriptorFile {
    path: PathBuf,
    original: String,
}

impl DescriptorFile {
    /// Read the whole file into memory.
    pub fn load(path: impl Into<PathBuf>) -> PatchResult<Self> {
        let path = path.into();
        let original = fs::read_to_string(&path).map_err(|e| PatchError::io(&path, e))?;
        Ok(DescriptorFile { path, original })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.original
    }
}

/// Replace `path` with `bytes` in one step.
///
/// The bytes go to a temporary file in the same directory which is then
/// renamed over the target, so an interrupted run leaves either the old or
/// the new content, never a truncated file. Permissions of an existing
/// target are carried over.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> PatchResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PatchError::io(path, e))?;
    tmp.write_all(bytes).map_err(|e| PatchError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| PatchError::io(path, e))?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(|e| PatchError::io(path, e))?;
    }

    tmp.persist(path).map_err(|e| PatchError::io(path, e.error))?;
    Ok(())
}

/// Runs patchers over descriptor files and turns every outcome into a
/// [`FileReport`]. One file's failure never stops the next file.
#[derive(Debug, Clone, Default)]
pub struct DescriptorPatcher {
    backups: BackupStore,
    dry_run: bool,
}

impl DescriptorPatcher {
    pub fn new(backups: BackupStore) -> Self {
        DescriptorPatcher {
            backups,
            dry_run: false,
        }
    }

    /// Compute edits and reports without touching the filesystem
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Apply the configuration-name -> asset mapping to one project descriptor.
    pub fn patch_project(
        &self,
        path: &Path,
        patcher: &ProjectPatcher,
        configurations: &FlavorMapping,
    ) -> FileReport {
        log::info!("[Project] Patching {}", path.display());

        let result = DescriptorFile::load(path).and_then(|file| {
            let edit = patcher.patch_content(file.content(), configurations)?;
            let mut report = FileReport::new(path);
            report.targets = edit.targets;
            self.commit(&file, &edit.content, &mut report)?;
            Ok(report)
        });

        match result {
            Ok(report) => report,
            Err(e) => {
                log::error!("[Project] {} skipped: {}", path.display(), e);
                FileReport::failed(path, e)
            }
        }
    }

    /// Ensure the icon pre-action in one scheme descriptor.
    pub fn patch_scheme(&self, target: &SchemeTarget, patcher: &SchemePatcher) -> FileReport {
        let path = target.path.as_path();
        log::info!(
            "[Scheme] Patching {} -> flavor {}",
            path.display(),
            target.flavor
        );

        let result = DescriptorFile::load(path).and_then(|file| {
            let edit = patcher.patch_content(path, file.content(), &target.flavor)?;
            let mut report = FileReport::new(path);
            report
                .targets
                .push(TargetReport::new(&target.flavor, TargetStatus::from(edit.outcome)));
            self.commit(&file, &edit.content, &mut report)?;
            Ok(report)
        });

        match result {
            Ok(report) => report,
            Err(e) => {
                log::warn!("[Scheme] {} skipped: {}", path.display(), e);
                FileReport::failed(path, e)
            }
        }
    }

    pub fn patch_schemes(&self, targets: &[SchemeTarget], patcher: &SchemePatcher) -> Vec<FileReport> {
        targets
            .iter()
            .map(|t| self.patch_scheme(t, patcher))
            .collect()
    }

    /// Patch everything a configuration names: the project descriptor
    /// first, then each scheme.
    pub fn run(&self, config: &PatcherConfig) -> Vec<FileReport> {
        let mut reports = Vec::new();

        if let Some(project) = &config.project {
            reports.push(self.patch_project(project, &config.project_patcher(), &config.configurations()));
        }

        if let Some(dir) = &config.schemes_dir {
            match config.scheme_targets() {
                Ok(targets) => {
                    log::info!("[Scheme] {} scheme(s) to patch", targets.len());
                    reports.extend(self.patch_schemes(&targets, &config.scheme_patcher()));
                }
                Err(e) => {
                    log::error!("[Scheme] Cannot list {}: {}", dir.display(), e);
                    reports.push(FileReport::failed(dir, e));
                }
            }
        }

        reports
    }

    /// Copy the backup for `path` back over it.
    pub fn restore(&self, path: &Path) -> PatchResult<BackupHandle> {
        if self.dry_run {
            return self.backups.existing(path).ok_or_else(|| PatchError::Backup {
                path: self.backups.backup_path(path),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no backup to restore from"),
            });
        }
        self.backups.restore_path(path)
    }

    fn commit(&self, file: &DescriptorFile, updated: &str, report: &mut FileReport) -> PatchResult<()> {
        report.backup = self.backups.existing(file.path()).map(|h| h.backup);

        if updated == file.content() {
            log::info!("[Patcher] {} unchanged", file.path().display());
            return Ok(());
        }
        report.changed = true;

        if self.dry_run {
            log::info!(
                "[Patcher] [DRY-RUN] Would rewrite {} ({} -> {} bytes)",
                file.path().display(),
                file.content().len(),
                updated.len()
            );
            return Ok(());
        }

        let handle = self.backups.snapshot(file.path())?;
        report.backup = Some(handle.backup);
        write_atomic(file.path(), updated.as_bytes())?;
        log::info!("[Patcher] Wrote {}", file.path().display());
        Ok(())
    }
}
