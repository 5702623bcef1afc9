//! Tests for default values and schema validation.

use galley_config::{
    BuildOptions, ConfigError, DevOptions, GalleyConfig, KitchenOptions, VersioningMethod,
};
use serde_json::json;
use std::path::PathBuf;

#[test]
fn galley_config_defaults() {
    let config = GalleyConfig::default();
    assert_eq!(config.root_directory, PathBuf::from("."));
    assert!(config.settings.log_level.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn kitchen_options_defaults() {
    let kitchen = KitchenOptions::default();
    assert_eq!(
        kitchen.supported_protocols,
        vec!["file:", "data:", "http:", "https:"]
    );
    assert!(kitchen.ignore.is_empty());
    assert!(kitchen.contain_inline_errors);
    assert_eq!(kitchen.max_redirects, 20);
    assert!(kitchen.supports_protocol("file:"));
    assert!(!kitchen.supports_protocol("ftp:"));
}

#[test]
fn build_options_defaults() {
    let build = BuildOptions::default();
    assert_eq!(build.build_directory, PathBuf::from("dist"));
    assert_eq!(build.base, "/");
    assert!(build.versioning);
    assert_eq!(build.versioning_method, VersioningMethod::Filename);
    assert_eq!(build.version_length, 8);
    assert!(build.manifest);
    assert_eq!(build.versioning_excluded_types, vec!["webmanifest"]);
}

#[test]
fn build_directory_for_unlisted_type_falls_back_to_other() {
    let build = BuildOptions::default();
    assert_eq!(build.directory_for("js_module"), "js/");
    assert_eq!(build.directory_for("css"), "css/");
    assert_eq!(build.directory_for("asset"), "other/");
}

#[test]
fn dev_options_defaults() {
    let dev = DevOptions::default();
    assert_eq!(dev.debounce_ms, 50);
    assert!(dev.hot_reload);
    assert_eq!(dev.client_channel_capacity, 100);
}

#[test]
fn from_value_fills_missing_sections() {
    let config = GalleyConfig::from_value(json!({
        "build": { "versioning_method": "search_param", "version_length": 12 }
    }))
    .expect("valid config");

    assert_eq!(config.build.versioning_method, VersioningMethod::SearchParam);
    assert_eq!(config.build.version_length, 12);
    assert_eq!(config.kitchen, KitchenOptions::default());
}

#[test]
fn to_value_round_trips_through_from_value() {
    let mut config = GalleyConfig::default();
    config.kitchen.ignore.push("^file:///.*/vendor/".to_string());
    let value = config.to_value().expect("serialize");
    assert_eq!(GalleyConfig::from_value(value).expect("parse"), config);
}

#[test]
fn rejects_protocol_without_colon() {
    let err = GalleyConfig::from_value(json!({
        "kitchen": { "supported_protocols": ["file"] }
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "kitchen.supported_protocols"));
}

#[test]
fn rejects_empty_protocol_list() {
    let mut config = GalleyConfig::default();
    config.kitchen.supported_protocols.clear();
    assert!(config.validate().is_err());
}

#[test]
fn rejects_bad_ignore_pattern() {
    let mut config = GalleyConfig::default();
    config.kitchen.ignore.push("(unclosed".to_string());
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidIgnorePattern { ref pattern, .. } if pattern == "(unclosed"));
}

#[test]
fn rejects_version_length_out_of_range() {
    let mut config = GalleyConfig::default();
    config.build.version_length = 2;
    assert!(config.validate().is_err());
    config.build.version_length = 65;
    assert!(config.validate().is_err());
    config.build.version_length = 64;
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_base_without_slashes() {
    let mut config = GalleyConfig::default();
    config.build.base = "/app".to_string();
    assert!(config.validate().is_err());
    config.build.base = "/app/".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_directory_without_trailing_slash() {
    let mut config = GalleyConfig::default();
    config
        .build
        .directories
        .insert("css".to_string(), "styles".to_string());
    assert!(config.validate().is_err());
}
