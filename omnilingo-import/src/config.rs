//! Import settings resolution
//!
//! **Priority:** CLI → ENV → TOML → compiled default
//!
//! A value set in more than one place is logged as a warning naming every
//! source, and the highest-priority one wins.

use crate::engine::{host_parallelism, DEFAULT_MAX_CHUNK};
use crate::processor::DEFAULT_COPYRIGHT;
use crate::store::ipfs::DEFAULT_API_URL;
use omnilingo_common::config::TomlConfig;
use omnilingo_common::{Error, Result};
use std::fmt::Display;
use std::str::FromStr;
use tracing::{info, warn};

pub const IPFS_API_ENV: &str = "OMNILINGO_IPFS_API";
pub const MAX_CHUNK_ENV: &str = "OMNILINGO_MAX_CHUNK";
pub const WORKERS_ENV: &str = "OMNILINGO_WORKERS";
pub const COPYRIGHT_ENV: &str = "OMNILINGO_COPYRIGHT";

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub ipfs_api_url: Option<String>,
    pub max_chunk: Option<usize>,
    pub workers: Option<usize>,
    pub copyright: Option<String>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub ipfs_api_url: String,
    pub max_chunk: usize,
    /// Host parallelism handed to the planner
    pub workers: usize,
    pub copyright: String,
}

/// Resolve settings against the process environment
pub fn resolve_settings(cli: &CliOverrides, toml: &TomlConfig) -> Result<ImportSettings> {
    resolve_settings_with(cli, toml, |name| std::env::var(name).ok())
}

/// Resolve settings with an explicit environment lookup
pub fn resolve_settings_with<F>(cli: &CliOverrides, toml: &TomlConfig, env: F) -> Result<ImportSettings>
where
    F: Fn(&str) -> Option<String>,
{
    // Blank variables count as unset
    let env_value = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    let ipfs_api_url = pick(
        "ipfs_api_url",
        cli.ipfs_api_url.clone(),
        env_value(IPFS_API_ENV),
        toml.ipfs_api_url.clone(),
    )
    .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let max_chunk = pick(
        "max_chunk",
        cli.max_chunk,
        parse_env(MAX_CHUNK_ENV, env_value(MAX_CHUNK_ENV))?,
        toml.max_chunk,
    )
    .unwrap_or(DEFAULT_MAX_CHUNK);

    let workers = match pick(
        "workers",
        cli.workers,
        parse_env(WORKERS_ENV, env_value(WORKERS_ENV))?,
        toml.workers,
    ) {
        Some(workers) => workers,
        None => host_parallelism(),
    };

    let copyright = pick(
        "copyright",
        cli.copyright.clone(),
        env_value(COPYRIGHT_ENV),
        toml.copyright.clone(),
    )
    .unwrap_or_else(|| DEFAULT_COPYRIGHT.to_string());

    if max_chunk == 0 {
        return Err(Error::Config("max_chunk must be at least 1".to_string()));
    }
    if workers == 0 {
        return Err(Error::Config("workers must be at least 1".to_string()));
    }

    Ok(ImportSettings {
        ipfs_api_url,
        max_chunk,
        workers,
        copyright,
    })
}

fn pick<T>(name: &str, cli: Option<T>, env: Option<T>, toml: Option<T>) -> Option<T> {
    let sources: Vec<&str> = [
        ("command line", cli.is_some()),
        ("environment", env.is_some()),
        ("TOML", toml.is_some()),
    ]
    .iter()
    .filter(|(_, set)| *set)
    .map(|(source, _)| *source)
    .collect();

    if sources.len() > 1 {
        warn!(
            setting = name,
            "Setting found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    } else if let Some(source) = sources.first() {
        info!(setting = name, source = *source, "Setting loaded");
    }

    cli.or(env).or(toml)
}

fn parse_env<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?} is invalid: {}", name, value, e)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings =
            resolve_settings_with(&CliOverrides::default(), &TomlConfig::default(), env_of(&[]))
                .unwrap();
        assert_eq!(settings.ipfs_api_url, DEFAULT_API_URL);
        assert_eq!(settings.max_chunk, DEFAULT_MAX_CHUNK);
        assert_eq!(settings.workers, host_parallelism());
        assert_eq!(settings.copyright, "CC0-1.0");
    }

    #[test]
    fn test_priority_cli_env_toml() {
        let toml = TomlConfig {
            ipfs_api_url: Some("http://toml:5001".to_string()),
            max_chunk: Some(10),
            workers: Some(2),
            copyright: Some("CC-BY-4.0".to_string()),
            ..Default::default()
        };
        let env = env_of(&[(IPFS_API_ENV, "http://env:5001"), (MAX_CHUNK_ENV, "20")]);
        let cli = CliOverrides {
            ipfs_api_url: Some("http://cli:5001".to_string()),
            ..Default::default()
        };

        let settings = resolve_settings_with(&cli, &toml, env).unwrap();
        assert_eq!(settings.ipfs_api_url, "http://cli:5001");
        assert_eq!(settings.max_chunk, 20);
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.copyright, "CC-BY-4.0");
    }

    #[test]
    fn test_blank_env_ignored() {
        let toml = TomlConfig {
            max_chunk: Some(7),
            ..Default::default()
        };
        let settings =
            resolve_settings_with(&CliOverrides::default(), &toml, env_of(&[(MAX_CHUNK_ENV, "  ")]))
                .unwrap();
        assert_eq!(settings.max_chunk, 7);
    }

    #[test]
    fn test_invalid_env_number_rejected() {
        let result = resolve_settings_with(
            &CliOverrides::default(),
            &TomlConfig::default(),
            env_of(&[(WORKERS_ENV, "many")]),
        );
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains(WORKERS_ENV)));
    }

    #[test]
    fn test_zero_values_rejected() {
        let cli = CliOverrides {
            max_chunk: Some(0),
            ..Default::default()
        };
        assert!(resolve_settings_with(&cli, &TomlConfig::default(), env_of(&[])).is_err());

        let cli = CliOverrides {
            workers: Some(0),
            ..Default::default()
        };
        assert!(resolve_settings_with(&cli, &TomlConfig::default(), env_of(&[])).is_err());
    }

    #[test]
    #[serial]
    fn test_process_environment_read() {
        std::env::set_var(COPYRIGHT_ENV, "CC-BY-SA-4.0");
        let settings = resolve_settings(&CliOverrides::default(), &TomlConfig::default());
        std::env::remove_var(COPYRIGHT_ENV);

        assert_eq!(settings.unwrap().copyright, "CC-BY-SA-4.0");
    }
}
