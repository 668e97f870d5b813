//! Configuration resolution tests
//!
//! Uses serial_test to prevent QLIB_CONFIG race conditions between tests.

use qlib_common::config::{load_config, resolve_config_path, ConfigLocation, Delimiter, CONFIG_ENV_VAR};
use qlib_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_argument_has_priority_over_env() {
    let dir = TempDir::new().unwrap();
    let cli = write_config(&dir, "cli.toml", "[logging]\nlevel = \"debug\"\n");
    let from_env = write_config(&dir, "env.toml", "[logging]\nlevel = \"warn\"\n");
    env::set_var(CONFIG_ENV_VAR, &from_env);

    assert_eq!(resolve_config_path(Some(&cli)), ConfigLocation::Explicit(cli.clone()));
    let config = load_config(Some(&cli)).unwrap();
    assert_eq!(config.logging.level, "debug");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    let dir = TempDir::new().unwrap();
    let from_env = write_config(&dir, "env.toml", "[worksheet]\ndelimiter = \",\"\nwrite_bom = false\n");
    env::set_var(CONFIG_ENV_VAR, &from_env);

    let config = load_config(None).unwrap();
    assert_eq!(config.worksheet.delimiter, Delimiter::Comma);
    assert!(!config.worksheet.write_bom);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let result = load_config(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_invalid_explicit_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let broken = write_config(&dir, "broken.toml", "[logging\nlevel = ");

    let result = load_config(Some(&broken));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_empty_env_var_falls_through_to_default_location() {
    env::set_var(CONFIG_ENV_VAR, "");

    match resolve_config_path(None) {
        ConfigLocation::Default(path) => assert!(path.ends_with("qlib/config.toml")),
        ConfigLocation::None => {}
        other => panic!("unexpected location: {:?}", other),
    }

    env::remove_var(CONFIG_ENV_VAR);
}
