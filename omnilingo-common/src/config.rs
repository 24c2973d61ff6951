//! Configuration file loading and path resolution
//!
//! The importer reads an optional TOML file. A missing or unreadable file is
//! never fatal: the caller logs a warning and continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "OMNILINGO_CONFIG";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. "info", "omnilingo_import=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `import.toml`
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Base URL of the IPFS HTTP RPC API (e.g. "http://127.0.0.1:5001")
    pub ipfs_api_url: Option<String>,
    /// Upper bound on records per chunk
    pub max_chunk: Option<usize>,
    /// Override for the detected logical core count
    pub workers: Option<usize>,
    /// License string stored in sentence documents and clip tags
    pub copyright: Option<String>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Default config file location for the platform
///
/// `~/.config/omnilingo/import.toml` on Linux, the platform config directory elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("omnilingo").join("import.toml"))
}

/// Resolve which config file to read
///
/// Priority order:
/// 1. Command-line argument (highest priority)
/// 2. `OMNILINGO_CONFIG` environment variable
/// 3. Platform default, only if the file exists
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file if there is one
///
/// `None` yields defaults. Callers treat an `Err` as a warning and fall back
/// to defaults themselves, once logging is up.
pub fn load_optional(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) => {
            let config = load_toml_config(path)?;
            debug!(path = %path.display(), "Loaded config file");
            Ok(config)
        }
        None => Ok(TomlConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file() {
        let config: TomlConfig = toml::from_str("max_chunk = 250\n[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.max_chunk, Some(250));
        assert_eq!(config.ipfs_api_url, None);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
