//! Tests for layered loading: defaults, galley.toml, GALLEY_* env and overrides.

use figment::Jail;
use galley_config::{ConfigError, ConfigLoader, VersioningMethod};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[test]
fn missing_root_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("nope");
    let err = ConfigLoader::new(&missing).load().unwrap_err();
    assert!(matches!(err, ConfigError::RootNotFound(path) if path == missing));
}

#[test]
fn loads_defaults_without_config_file() {
    Jail::expect_with(|jail| {
        let config = ConfigLoader::new(jail.directory())
            .load()
            .map_err(|e| e.to_string())?;
        assert_eq!(config.root_directory, jail.directory());
        assert!(config.build.versioning);
        Ok(())
    });
}

#[test]
fn reads_galley_toml_from_root() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "galley.toml",
            r#"
[build]
versioning_method = "search_param"
base = "/static/"

[kitchen]
ignore = ["^https://cdn\\."]
"#,
        )?;
        let config = ConfigLoader::new(jail.directory())
            .load()
            .map_err(|e| e.to_string())?;
        assert_eq!(config.build.versioning_method, VersioningMethod::SearchParam);
        assert_eq!(config.build.base, "/static/");
        assert_eq!(config.kitchen.ignore.len(), 1);
        // unspecified fields keep their defaults
        assert_eq!(config.build.version_length, 8);
        Ok(())
    });
}

#[test]
fn explicit_file_replaces_default_location() {
    let dir = TempDir::new().expect("tempdir");
    let custom = dir.path().join("custom.toml");
    fs::write(&custom, "[dev]\ndebounce_ms = 250\n").expect("write config");

    let config = ConfigLoader::new(dir.path())
        .file(&custom)
        .load()
        .expect("load");
    assert_eq!(config.dev.debounce_ms, 250);
}

#[test]
fn env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("galley.toml", "[build]\nversion_length = 10\n")?;
        jail.set_env("GALLEY_BUILD__VERSION_LENGTH", "16");
        let config = ConfigLoader::new(jail.directory())
            .load()
            .map_err(|e| e.to_string())?;
        assert_eq!(config.build.version_length, 16);
        Ok(())
    });
}

#[test]
fn overrides_win_over_env_and_file() {
    Jail::expect_with(|jail| {
        jail.create_file("galley.toml", "[build]\nversioning = true\n")?;
        jail.set_env("GALLEY_BUILD__VERSIONING", "true");
        let config = ConfigLoader::new(jail.directory())
            .with_overrides(json!({ "build": { "versioning": false } }))
            .load()
            .map_err(|e| e.to_string())?;
        assert!(!config.build.versioning);
        Ok(())
    });
}

#[test]
fn invalid_file_values_fail_validation() {
    Jail::expect_with(|jail| {
        jail.create_file("galley.toml", "[build]\nbase = \"static\"\n")?;
        let result = ConfigLoader::new(jail.directory()).load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        Ok(())
    });
}
