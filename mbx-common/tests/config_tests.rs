//! Configuration loading and root folder resolution
//!
//! Tests that touch `MBX_ROOT_FOLDER` or `MBX_CONFIG` are marked `#[serial]`
//! so they never race on process environment.

use mbx_common::config::{
    default_root_folder, load_config, load_toml_config, resolve_root_folder, TomlConfig,
    UnwrapMode, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert_eq!(resolved, default_root_folder());
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, &config);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");

    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &TomlConfig::default());
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "  ");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, &config);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_config_env_locates_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [ingest]
        unwrap_mode = "native"
        max_concurrent_databases = 2
        "#,
    );
    env::set_var(CONFIG_FILE_ENV, &path);

    let config = load_config(None);
    env::remove_var(CONFIG_FILE_ENV);

    let config = config.unwrap();
    assert_eq!(config.ingest.unwrap_mode, UnwrapMode::Native);
    assert_eq!(config.ingest.max_concurrent_databases, 2);
}

#[test]
fn test_load_full_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        root_folder = "/data/mbx"

        [logging]
        level = "warn"
        file = "/var/log/mbx.log"

        [ingest]
        work_root = "/scratch"
        unwrap_program = "abe"
        unwrap_args = ["unpack", "{input}", "{output}", "secret"]
        run_timeout_secs = 60
        "#,
    );

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/data/mbx")));
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/mbx.log")));
    assert_eq!(config.ingest.work_root, Some(PathBuf::from("/scratch")));
    assert_eq!(config.ingest.unwrap_program, "abe");
    assert_eq!(config.ingest.unwrap_args.len(), 4);
    assert_eq!(config.ingest.run_timeout_secs, 60);
    assert_eq!(config.ingest.max_table_rows, 1000);
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[ingest\nmax_table_rows = ");

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, mbx_common::Error::Config(_)));
    assert!(err.to_string().contains("Parse"));
}

#[test]
fn test_wrong_type_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[ingest]\nmax_table_rows = \"many\"\n");

    assert!(load_toml_config(&path).is_err());
}
