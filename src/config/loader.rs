//! Config file loader and serialization.

use crate::config::validator::validate_config;
use crate::config::PatcherConfig;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// File formats a configuration can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

/// Load, rebase and validate a configuration file.
///
/// Relative `project` and `schemes_dir` paths are resolved against the
/// directory holding the configuration file.
pub fn load_config_from_file(path: &Path) -> Result<PatcherConfig, ConfigError> {
    let format = validate_config_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Configuration file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let mut config = parse_config(&content, format)?;
    if let Some(base) = path.parent() {
        rebase_paths(&mut config, base);
    }

    validate_config(&config)?;
    log::debug!(
        "[Config] Loaded {} ({} flavor(s))",
        path.display(),
        config.flavors.len()
    );
    Ok(config)
}

/// Parse configuration text without touching the filesystem.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<PatcherConfig, ConfigError> {
    let config = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    Ok(config)
}

/// Save config, picking the format from the extension.
pub fn save_config_to_file(config: &PatcherConfig, path: &Path) -> Result<(), ConfigError> {
    let format = validate_config_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = match format {
        ConfigFormat::Toml => toml::to_string_pretty(config)
            .map_err(|e| ConfigError::UnsupportedFormat(format!("TOML serialization failed: {}", e)))?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
    };

    fs::write(path, content)?;
    Ok(())
}

/// Validate config path (.toml or .json extension required).
pub fn validate_config_path(path: &Path) -> Result<ConfigFormat, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    if path.to_str().is_none() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path contains invalid characters".to_string(),
        ));
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(ConfigFormat::Toml),
        Some("json") => Ok(ConfigFormat::Json),
        Some(ext) => Err(ConfigError::UnsupportedFormat(format!(
            "Configuration file must have .toml or .json extension, got .{}",
            ext
        ))),
        None => Err(ConfigError::UnsupportedFormat(
            "Configuration file must have .toml or .json extension".to_string(),
        )),
    }
}

fn rebase_paths(config: &mut PatcherConfig, base: &Path) {
    let rebase = |p: &mut Option<PathBuf>| {
        if let Some(path) = p {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    };
    rebase(&mut config.project);
    rebase(&mut config.schemes_dir);
}
