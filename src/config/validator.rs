//! Config validation.

use crate::config::PatcherConfig;
use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex")
});

/// Validate a whole configuration.
pub fn validate_config(config: &PatcherConfig) -> Result<(), ConfigError> {
    if config.project.is_none() && config.schemes_dir.is_none() {
        return Err(ConfigError::ValidationFailed(
            "Nothing to patch: set `project`, `schemes_dir`, or both".to_string(),
        ));
    }

    let discovers = config.discover_schemes && config.schemes_dir.is_some();
    if config.flavors.is_empty() && !discovers {
        return Err(ConfigError::ValidationFailed(
            "At least one flavor is required unless schemes are discovered".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for flavor in &config.flavors {
        validate_flavor_name(&flavor.name)?;
        if !seen.insert(flavor.name.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Flavor '{}' is listed more than once",
                flavor.name
            )));
        }
        if let Some(asset) = &flavor.asset {
            validate_asset_name(asset)?;
        }
    }

    validate_build_types(&config.build_types)?;
    validate_backup_suffix(&config.backup_suffix)?;
    validate_asset_key(&config.asset_key)?;

    if config.script_path.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Script path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Flavor names end up inside `/* Debug-<name> */` markers and script
/// arguments, so they must be non-empty single tokens.
pub fn validate_flavor_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Flavor name cannot be empty".to_string(),
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ConfigError::ValidationFailed(format!(
            "Flavor name '{}' contains whitespace",
            name
        )));
    }
    if name.contains("*/") || name.contains('"') {
        return Err(ConfigError::ValidationFailed(format!(
            "Flavor name '{}' contains a comment terminator or quote",
            name
        )));
    }
    Ok(())
}

pub fn validate_asset_name(asset: &str) -> Result<(), ConfigError> {
    if asset.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Asset-set name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate build types (non-empty, unique, single tokens).
pub fn validate_build_types(build_types: &[String]) -> Result<(), ConfigError> {
    if build_types.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "At least one build type is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for build_type in build_types {
        if build_type.is_empty() || build_type.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid build type '{}'",
                build_type
            )));
        }
        if !seen.insert(build_type.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Build type '{}' is listed more than once",
                build_type
            )));
        }
    }
    Ok(())
}

pub fn validate_backup_suffix(suffix: &str) -> Result<(), ConfigError> {
    if !suffix.starts_with('.') || suffix.len() < 2 {
        return Err(ConfigError::ValidationFailed(format!(
            "Backup suffix must start with '.' and name something, got '{}'",
            suffix
        )));
    }
    if suffix.contains('/') || suffix.contains('\\') {
        return Err(ConfigError::ValidationFailed(format!(
            "Backup suffix '{}' cannot contain path separators",
            suffix
        )));
    }
    Ok(())
}

/// The key is written bare into the project descriptor.
pub fn validate_asset_key(key: &str) -> Result<(), ConfigError> {
    if !IDENTIFIER_REGEX.is_match(key) {
        return Err(ConfigError::ValidationFailed(format!(
            "Asset key '{}' is not a valid build setting name",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlavorEntry;
    use std::path::PathBuf;

    fn valid() -> PatcherConfig {
        PatcherConfig {
            project: Some(PathBuf::from("ios/Runner.xcodeproj/project.pbxproj")),
            flavors: vec![FlavorEntry::new("demo"), FlavorEntry::new("ouroPreto")],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_nothing_to_patch() {
        let mut config = valid();
        config.project = None;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_flavors_required_without_discovery() {
        let mut config = valid();
        config.flavors.clear();
        assert!(validate_config(&config).is_err());

        config.schemes_dir = Some(PathBuf::from("schemes"));
        assert!(validate_config(&config).is_ok());

        config.discover_schemes = false;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_flavor_names() {
        assert!(validate_flavor_name("ouroPreto").is_ok());
        assert!(validate_flavor_name("patos-de-minas").is_ok());
        assert!(validate_flavor_name("").is_err());
        assert!(validate_flavor_name("ouro preto").is_err());
        assert!(validate_flavor_name("demo*/").is_err());
        assert!(validate_flavor_name("de\"mo").is_err());
    }

    #[test]
    fn test_duplicate_flavor() {
        let mut config = valid();
        config.flavors.push(FlavorEntry::new("demo"));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationFailed(msg)) if msg.contains("more than once")
        ));
    }

    #[test]
    fn test_build_types() {
        let types = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(validate_build_types(&types(&["Debug", "Release"])).is_ok());
        assert!(validate_build_types(&[]).is_err());
        assert!(validate_build_types(&types(&["Debug", "Debug"])).is_err());
        assert!(validate_build_types(&types(&["Ad Hoc"])).is_err());
    }

    #[test]
    fn test_backup_suffix() {
        assert!(validate_backup_suffix(".backup").is_ok());
        assert!(validate_backup_suffix(".backup2").is_ok());
        assert!(validate_backup_suffix("backup").is_err());
        assert!(validate_backup_suffix(".").is_err());
        assert!(validate_backup_suffix("./x").is_err());
    }

    #[test]
    fn test_asset_key() {
        assert!(validate_asset_key("ASSETCATALOG_COMPILER_APPICON_NAME").is_ok());
        assert!(validate_asset_key("_PRIVATE").is_ok());
        assert!(validate_asset_key("").is_err());
        assert!(validate_asset_key("1KEY").is_err());
        assert!(validate_asset_key("KEY = x").is_err());
    }
}
