//! Run configuration for the descriptor patchers.
//!
//! # Module Structure
//!
//! - `loader`: reads a configuration from a `.toml` or `.json` file
//! - `validator`: checks flavor names, build types and key names
//!
//! The flavor list lives here and nowhere else. A loaded [`PatcherConfig`]
//! is turned into the caller-supplied [`FlavorMapping`] and scheme target
//! list the patchers consume.

pub mod loader;
pub mod validator;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PatchResult;
use crate::models::{capitalize_flavor, default_asset_name, FlavorMapping};
use crate::patcher::backup::{BackupStore, DEFAULT_BACKUP_SUFFIX};
use crate::patcher::project::{ProjectPatcher, DEFAULT_ASSET_KEY};
use crate::patcher::scheme::{self, SchemePatcher, SchemeTarget, DEFAULT_SCRIPT_PATH, SCHEME_EXTENSION};

pub const DEFAULT_BUILD_TYPES: &[&str] = &["Debug", "Release", "Profile"];
pub const DEFAULT_EXCLUDED_SCHEME: &str = "Runner.xcscheme";

/// One flavor as written in the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorEntry {
    /// Configuration suffix, e.g. `ouroPreto` for `Debug-ouroPreto`
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

impl FlavorEntry {
    pub fn new(name: impl Into<String>) -> Self {
        FlavorEntry {
            name: name.into(),
            display: None,
            asset: None,
            scheme: None,
        }
    }

    /// Name passed to the icon script; defaults to the capitalized name
    pub fn display_name(&self) -> String {
        self.display
            .clone()
            .unwrap_or_else(|| capitalize_flavor(&self.name))
    }

    pub fn asset_name(&self) -> String {
        self.asset
            .clone()
            .unwrap_or_else(|| default_asset_name(&self.display_name()))
    }

    pub fn scheme_file(&self) -> String {
        self.scheme
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.name, SCHEME_EXTENSION))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatcherConfig {
    /// Path to `project.pbxproj`
    pub project: Option<PathBuf>,
    /// Directory holding the `*.xcscheme` files
    pub schemes_dir: Option<PathBuf>,
    pub script_path: String,
    pub asset_key: String,
    pub build_types: Vec<String>,
    pub backup_suffix: String,
    pub discover_schemes: bool,
    pub excluded_schemes: Vec<String>,
    pub flavors: Vec<FlavorEntry>,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        PatcherConfig {
            project: None,
            schemes_dir: None,
            script_path: DEFAULT_SCRIPT_PATH.to_string(),
            asset_key: DEFAULT_ASSET_KEY.to_string(),
            build_types: DEFAULT_BUILD_TYPES.iter().map(|s| s.to_string()).collect(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            discover_schemes: true,
            excluded_schemes: vec![DEFAULT_EXCLUDED_SCHEME.to_string()],
            flavors: Vec::new(),
        }
    }
}

impl PatcherConfig {
    /// Layout of a Flutter iOS project rooted at `root`
    pub fn for_ios_root(root: &Path) -> Self {
        PatcherConfig {
            project: Some(root.join("ios/Runner.xcodeproj/project.pbxproj")),
            schemes_dir: Some(root.join("ios/Runner.xcodeproj/xcshareddata/xcschemes")),
            ..Default::default()
        }
    }

    /// Flavor name -> asset-set name, in file order
    pub fn flavor_mapping(&self) -> FlavorMapping {
        FlavorMapping::from_pairs(self.flavors.iter().map(|f| (f.name.clone(), f.asset_name())))
    }

    /// Build configuration name -> asset-set name for the project patcher
    pub fn configurations(&self) -> FlavorMapping {
        self.flavor_mapping().configurations(&self.build_types)
    }

    /// Scheme targets named by the flavor list.
    ///
    /// A flavor with an explicit `scheme` is always targeted. One relying on
    /// the default `<name>.xcscheme` is targeted only when that file exists.
    pub fn explicit_scheme_targets(&self) -> Vec<SchemeTarget> {
        let Some(dir) = &self.schemes_dir else {
            return Vec::new();
        };

        self.flavors
            .iter()
            .filter_map(|f| {
                let path = dir.join(f.scheme_file());
                if f.scheme.is_none() && !path.is_file() {
                    log::debug!("[Config] No scheme file for flavor '{}'", f.name);
                    return None;
                }
                Some(SchemeTarget::new(path, f.display_name()))
            })
            .collect()
    }

    /// Explicit targets plus, when enabled, every other scheme in the directory.
    pub fn scheme_targets(&self) -> PatchResult<Vec<SchemeTarget>> {
        let explicit = self.explicit_scheme_targets();
        match (&self.schemes_dir, self.discover_schemes) {
            (Some(dir), true) => scheme::discover_schemes(dir, &explicit, &self.excluded_schemes),
            _ => Ok(explicit),
        }
    }

    pub fn project_patcher(&self) -> ProjectPatcher {
        ProjectPatcher::new(&self.asset_key)
    }

    pub fn scheme_patcher(&self) -> SchemePatcher {
        SchemePatcher::new(&self.script_path)
    }

    pub fn backup_store(&self) -> BackupStore {
        BackupStore::new(&self.backup_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> PatcherConfig {
        PatcherConfig {
            flavors: vec![
                FlavorEntry::new("demo"),
                FlavorEntry {
                    name: "ouroPreto".to_string(),
                    display: None,
                    asset: Some("AppIcon-OP".to_string()),
                    scheme: None,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PatcherConfig::default();
        assert_eq!(config.script_path, "Scripts/copy_appicon.sh");
        assert_eq!(config.asset_key, "ASSETCATALOG_COMPILER_APPICON_NAME");
        assert_eq!(config.build_types, vec!["Debug", "Release", "Profile"]);
        assert_eq!(config.backup_suffix, ".backup");
        assert!(config.discover_schemes);
        assert_eq!(config.excluded_schemes, vec!["Runner.xcscheme"]);
    }

    #[test]
    fn test_flavor_entry_defaults() {
        let entry = FlavorEntry::new("ouroPreto");
        assert_eq!(entry.display_name(), "OuroPreto");
        assert_eq!(entry.asset_name(), "AppIcon-OuroPreto");
        assert_eq!(entry.scheme_file(), "ouroPreto.xcscheme");
    }

    #[test]
    fn test_configurations_follow_flavor_order() {
        let mut config = sample();
        config.build_types = vec!["Debug".to_string(), "Release".to_string()];
        let pairs: Vec<_> = config
            .configurations()
            .iter()
            .map(|(c, a)| format!("{}={}", c, a))
            .collect();
        assert_eq!(
            pairs,
            vec![
                "Debug-demo=AppIcon-Demo",
                "Release-demo=AppIcon-Demo",
                "Debug-ouroPreto=AppIcon-OP",
                "Release-ouroPreto=AppIcon-OP",
            ]
        );
    }

    #[test]
    fn test_scheme_targets_with_discovery() {
        let dir = TempDir::new().unwrap();
        for name in ["ouroPreto.xcscheme", "vicosa.xcscheme", "Runner.xcscheme"] {
            fs::write(dir.path().join(name), "<Scheme/>").unwrap();
        }

        let mut config = sample();
        config.schemes_dir = Some(dir.path().to_path_buf());
        let targets = config.scheme_targets().unwrap();
        let flavors: Vec<_> = targets.iter().map(|t| t.flavor.as_str()).collect();
        // demo has no scheme file; vicosa is discovered
        assert_eq!(flavors, vec!["OuroPreto", "Vicosa"]);

        config.discover_schemes = false;
        let flavors: Vec<_> = config
            .scheme_targets()
            .unwrap()
            .into_iter()
            .map(|t| t.flavor)
            .collect();
        assert_eq!(flavors, vec!["OuroPreto"]);
    }

    #[test]
    fn test_explicit_scheme_is_kept_even_if_missing() {
        let dir = TempDir::new().unwrap();
        let mut config = sample();
        config.schemes_dir = Some(dir.path().to_path_buf());
        config.discover_schemes = false;
        config.flavors[0].scheme = Some("main.xcscheme".to_string());

        let targets = config.scheme_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].file_name(), Some("main.xcscheme"));
        assert_eq!(targets[0].flavor, "Demo");
    }
}
