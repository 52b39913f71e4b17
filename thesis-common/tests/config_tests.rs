//! Tests for configuration loading and root folder resolution
//!
//! Uses serial_test to prevent ENV variable race conditions: tests that
//! touch THESIS_ROOT_FOLDER are marked #[serial].

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;
use thesis_common::config::{
    load_toml_config, write_toml_config, CompiledDefaults, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, TomlConfig, WorkflowSettings, ROOT_FOLDER_ENV,
};

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
    assert_eq!(defaults.bind_addr, "127.0.0.1:5740");
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/thesis-env-folder");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/thesis-toml-folder")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("thesis-test")
        .with_cli_arg(Some(PathBuf::from("/tmp/thesis-cli-folder")));

    assert_eq!(resolver.resolve_with(&config), PathBuf::from("/tmp/thesis-cli-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/thesis-env-folder");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/thesis-toml-folder")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("thesis-test");

    assert_eq!(resolver.resolve_with(&config), PathBuf::from("/tmp/thesis-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_beats_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/thesis-toml-folder")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("thesis-test");

    assert_eq!(resolver.resolve_with(&config), PathBuf::from("/tmp/thesis-toml-folder"));
}

#[test]
#[serial]
fn test_no_overrides_uses_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new("thesis-test");
    let root_folder = resolver.resolve_with(&TomlConfig::default());

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let resolver = RootFolderResolver::new("thesis-test")
        .with_config_path(Some(dir.path().join("does-not-exist.toml")));

    assert_eq!(resolver.load_config(), TomlConfig::default());
}

#[test]
fn test_malformed_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is [not toml").unwrap();

    assert!(load_toml_config(&path).is_err());

    let resolver = RootFolderResolver::new("thesis-test").with_config_path(Some(path));
    assert_eq!(resolver.load_config(), TomlConfig::default());
}

#[test]
fn test_write_then_load_preserves_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/thesis")),
        bind_addr: Some("0.0.0.0:5740".to_string()),
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: None,
        },
        workflow: WorkflowSettings {
            open_scope_when_unset: true,
            unassigned_page_size: 75,
            ..WorkflowSettings::default()
        },
    };

    write_toml_config(&config, &path).unwrap();
    assert!(!dir.path().join("config.toml.tmp").exists());

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_initializer_paths() {
    let root = PathBuf::from("/tmp/thesis-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("thesis.db"));
    assert!(!initializer.database_exists());
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
}
