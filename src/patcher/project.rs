//! Project descriptor patching.
//!
//! Sets the app-icon asset key in the `buildSettings` of every named build
//! configuration. The descriptor is never parsed as a whole: each
//! configuration is located by its `/* NAME */ = {` marker, and only the
//! value token (or a new line before the closing brace) is spliced in.

use crate::error::PatchError;
use crate::models::{FlavorMapping, TargetReport, TargetStatus};
use super::editor::{find_key, upsert};
use super::locator::{find_child_block, find_named_blocks, Section};
use super::PatchResult;

pub const DEFAULT_ASSET_KEY: &str = "ASSETCATALOG_COMPILER_APPICON_NAME";
pub const SETTINGS_BLOCK: &str = "buildSettings";

/// Content after patching the project, with one report per configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEdit {
    pub content: String,
    pub targets: Vec<TargetReport>,
}

impl ProjectEdit {
    pub fn count(&self, pred: impl Fn(&TargetStatus) -> bool) -> usize {
        self.targets.iter().filter(|t| pred(&t.status)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPatcher {
    key: String,
    settings_block: String,
}

impl Default for ProjectPatcher {
    fn default() -> Self {
        ProjectPatcher::new(DEFAULT_ASSET_KEY)
    }
}

impl ProjectPatcher {
    pub fn new(key: impl Into<String>) -> Self {
        ProjectPatcher {
            key: key.into(),
            settings_block: SETTINGS_BLOCK.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Apply `configurations` (configuration name -> asset-set name) in order.
    ///
    /// A configuration that cannot be located or is ambiguous is reported
    /// and skipped; the remaining configurations are still applied. Only a
    /// malformed descriptor aborts the file.
    pub fn patch_content(&self, content: &str, configurations: &FlavorMapping) -> PatchResult<ProjectEdit> {
        let mut current = content.to_string();
        let mut targets = Vec::with_capacity(configurations.len());

        for (configuration, asset) in configurations.iter() {
            let status = match self.apply(&current, configuration, asset) {
                Ok((updated, status)) => {
                    current = updated;
                    status
                }
                Err(PatchError::SectionNotFound(name)) => {
                    log::warn!("[Project] Configuration '{}' not found", name);
                    TargetStatus::SectionNotFound
                }
                Err(PatchError::AmbiguousMatch { key, candidates }) => {
                    log::warn!(
                        "[Project] '{}' is ambiguous ({} candidates), left untouched",
                        key,
                        candidates
                    );
                    TargetStatus::Ambiguous { candidates }
                }
                Err(e) => return Err(e),
            };
            log::debug!("[Project] {} -> {}: {}", configuration, asset, status);
            targets.push(TargetReport::new(configuration, status));
        }

        Ok(ProjectEdit {
            content: current,
            targets,
        })
    }

    fn apply(&self, content: &str, configuration: &str, asset: &str) -> PatchResult<(String, TargetStatus)> {
        let settings = self.locate_settings(content, configuration)?;
        let edit = upsert(content, &settings, &self.key, asset)?;
        Ok((edit.content, TargetStatus::from(edit.outcome)))
    }

    /// The single `buildSettings` block of `configuration`.
    ///
    /// Several blocks can carry the same configuration name (project-level
    /// and target-level). Those are narrowed to the blocks that already set
    /// the key; anything other than one survivor is ambiguous.
    pub fn locate_settings(&self, content: &str, configuration: &str) -> PatchResult<Section> {
        let mut candidates = Vec::new();
        for block in find_named_blocks(content, configuration)? {
            if let Some(settings) = find_child_block(content, &block, &self.settings_block)? {
                candidates.push(settings);
            }
        }

        match candidates.len() {
            0 => Err(PatchError::SectionNotFound(configuration.to_string())),
            1 => Ok(candidates.remove(0)),
            n => {
                let mut with_key = Vec::new();
                for settings in candidates {
                    if find_key(content, &settings, &self.key)?.is_some() {
                        with_key.push(settings);
                    }
                }
                if with_key.len() == 1 {
                    log::debug!(
                        "[Project] '{}' narrowed from {} blocks to the one setting {}",
                        configuration,
                        n,
                        self.key
                    );
                    Ok(with_key.remove(0))
                } else {
                    Err(PatchError::AmbiguousMatch {
                        key: configuration.to_string(),
                        candidates: n,
                    })
                }
            }
        }
    }
}
