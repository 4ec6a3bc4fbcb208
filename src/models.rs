//! Core data types for Flavor Icons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Ordered (flavor name, asset-set name) pairs supplied by the caller.
///
/// The order is the order edits are applied and reported in. The mapping is
/// never mutated by a patcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorMapping {
    pairs: Vec<(String, String)>,
}

impl FlavorMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, F, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (F, A)>,
        F: Into<String>,
        A: Into<String>,
    {
        FlavorMapping {
            pairs: pairs
                .into_iter()
                .map(|(f, a)| (f.into(), a.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, flavor: impl Into<String>, asset: impl Into<String>) {
        self.pairs.push((flavor.into(), asset.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(f, a)| (f.as_str(), a.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Asset-set name for a flavor, if mapped
    pub fn asset_for(&self, flavor: &str) -> Option<&str> {
        self.iter().find(|(f, _)| *f == flavor).map(|(_, a)| a)
    }

    /// Expand every flavor into its build configuration names.
    ///
    /// `{demo -> AppIcon-Demo}` with build types `[Debug, Release]` becomes
    /// `{Debug-demo -> AppIcon-Demo, Release-demo -> AppIcon-Demo}`. Flavor
    /// order is kept; build types vary fastest.
    pub fn configurations<S: AsRef<str>>(&self, build_types: &[S]) -> FlavorMapping {
        let mut expanded = FlavorMapping::new();
        for (flavor, asset) in self.iter() {
            for build_type in build_types {
                expanded.push(format!("{}-{}", build_type.as_ref(), flavor), asset);
            }
        }
        expanded
    }
}

/// Capitalize the first character of a flavor name: `ouroPreto` -> `OuroPreto`
pub fn capitalize_flavor(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Default asset-set name for a display flavor name
pub fn default_asset_name(display: &str) -> String {
    format!("AppIcon-{}", display)
}

/// Outcome of a successful edit on one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOutcome {
    /// The descriptor content changed
    Applied,
    /// The desired state was already present; nothing changed
    AlreadyPresent,
}

/// Per-target status as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetStatus {
    Applied,
    AlreadyPresent,
    SectionNotFound,
    Ambiguous { candidates: usize },
    Failed(String),
}

impl From<EditOutcome> for TargetStatus {
    fn from(outcome: EditOutcome) -> Self {
        match outcome {
            EditOutcome::Applied => TargetStatus::Applied,
            EditOutcome::AlreadyPresent => TargetStatus::AlreadyPresent,
        }
    }
}

impl TargetStatus {
    /// What the user has to do by hand, for statuses the patcher cannot resolve.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TargetStatus::SectionNotFound => {
                Some("no configuration block has this exact name; create it or fix the flavor name")
            }
            TargetStatus::Ambiguous { .. } => Some(
                "several blocks share this name; set the key by hand in exactly \
                 one of them, then re-run",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetStatus::Applied => write!(f, "applied"),
            TargetStatus::AlreadyPresent => write!(f, "already present"),
            TargetStatus::SectionNotFound => write!(f, "section not found"),
            TargetStatus::Ambiguous { candidates } => {
                write!(f, "ambiguous ({} candidates)", candidates)
            }
            TargetStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One target (a scheme or a build configuration) and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: String,
    pub status: TargetStatus,
}

impl TargetReport {
    pub fn new(target: impl Into<String>, status: TargetStatus) -> Self {
        TargetReport {
            target: target.into(),
            status,
        }
    }
}

/// Result of processing one descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub targets: Vec<TargetReport>,
    /// True when the content changed (and was written, unless dry run)
    pub changed: bool,
    /// Backup path, when a snapshot exists for this file
    pub backup: Option<PathBuf>,
    /// Set when the file could not be processed at all
    pub error: Option<String>,
}

impl FileReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileReport {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn failed(path: impl Into<PathBuf>, error: impl fmt::Display) -> Self {
        FileReport {
            path: path.into(),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn count(&self, pred: impl Fn(&TargetStatus) -> bool) -> usize {
        self.targets.iter().filter(|t| pred(&t.status)).count()
    }
}

/// Aggregate over a whole run. The only surfaced failure signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSummary {
    pub files_touched: usize,
    pub files_unchanged: usize,
    pub files_failed: usize,
    pub applied: usize,
    pub no_ops: usize,
    pub not_found: usize,
    pub ambiguous: usize,
    pub failed_targets: usize,
}

impl PatchSummary {
    pub fn record(&mut self, report: &FileReport) {
        if report.error.is_some() {
            self.files_failed += 1;
        } else if report.changed {
            self.files_touched += 1;
        } else {
            self.files_unchanged += 1;
        }

        for t in &report.targets {
            match t.status {
                TargetStatus::Applied => self.applied += 1,
                TargetStatus::AlreadyPresent => self.no_ops += 1,
                TargetStatus::SectionNotFound => self.not_found += 1,
                TargetStatus::Ambiguous { .. } => self.ambiguous += 1,
                TargetStatus::Failed(_) => self.failed_targets += 1,
            }
        }
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a FileReport>) -> Self {
        let mut summary = PatchSummary::default();
        for r in reports {
            summary.record(r);
        }
        summary
    }

    /// True when nothing failed, was ambiguous or went missing
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
            && self.not_found == 0
            && self.ambiguous == 0
            && self.failed_targets == 0
    }
}

impl fmt::Display for PatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "files: {} touched, {} unchanged, {} failed",
            self.files_touched, self.files_unchanged, self.files_failed
        )?;
        write!(
            f,
            "targets: {} applied, {} no-op, {} not found, {} ambiguous, {} failed",
            self.applied, self.no_ops, self.not_found, self.ambiguous, self.failed_targets
        )
    }
}
