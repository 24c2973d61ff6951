//! Configuration loading and graceful degradation
//!
//! Uses serial_test: tests touching OMNILINGO_CONFIG are marked #[serial]
//! so they never race on the process environment.

use omnilingo_common::config::{
    load_optional, load_toml_config, resolve_config_path, LoggingConfig,
    TomlConfig, CONFIG_PATH_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_no_file_means_defaults() {
    assert_eq!(load_optional(None).unwrap(), TomlConfig::default());
}

#[test]
fn test_missing_named_file_is_error() {
    let result = load_optional(Some(Path::new("/nonexistent/omnilingo/import.toml")));
    assert!(matches!(result, Err(omnilingo_common::Error::Config(_))));
}

#[test]
fn test_malformed_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("import.toml");
    std::fs::write(&path, "max_chunk = \"not a number\"").unwrap();

    assert!(load_toml_config(&path).is_err());
    assert!(load_optional(Some(&path)).is_err());
}

#[test]
fn test_full_file_loads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("import.toml");
    std::fs::write(
        &path,
        "ipfs_api_url = \"http://10.0.0.2:5001\"\n\
         max_chunk = 500\n\
         workers = 6\n\
         copyright = \"CC0-1.0\"\n\
         \n\
         [logging]\n\
         level = \"omnilingo_import=debug\"\n",
    )
    .unwrap();

    let config = TomlConfig {
        ipfs_api_url: Some("http://10.0.0.2:5001".to_string()),
        max_chunk: Some(500),
        workers: Some(6),
        copyright: Some("CC0-1.0".to_string()),
        logging: LoggingConfig {
            level: "omnilingo_import=debug".to_string(),
        },
    };
    assert_eq!(load_toml_config(&path).unwrap(), config);
    assert_eq!(load_optional(Some(&path)).unwrap(), config);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_arg() {
    env::set_var(CONFIG_PATH_ENV, "/etc/omnilingo/custom.toml");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(resolved, Some(PathBuf::from("/etc/omnilingo/custom.toml")));
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(CONFIG_PATH_ENV, "/etc/omnilingo/custom.toml");
    let resolved = resolve_config_path(Some(Path::new("./local.toml")));
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(resolved, Some(PathBuf::from("./local.toml")));
}

#[test]
#[serial]
fn test_blank_env_var_ignored() {
    env::set_var(CONFIG_PATH_ENV, "   ");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_PATH_ENV);

    // Either nothing, or the platform default if the developer has one
    if let Some(path) = resolved {
        assert!(path.ends_with("omnilingo/import.toml"));
    }
}
