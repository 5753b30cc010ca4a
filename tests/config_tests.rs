// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use persona_feed::Config;
use persona_feed::backends::capture::CaptureBackendType;
use std::time::Duration;

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = Config::default();

    // Check sensible defaults
    assert_eq!(config.tick_interval(), Duration::from_secs(6));
    assert_eq!(config.jpeg_quality(), 80);
    assert_eq!((config.capture_width, config.capture_height), (1280, 720));
    assert_eq!(config.capture_timeout(), Duration::from_secs(10));
    assert_eq!(config.request_timeout(), Duration::from_secs(90));
    assert!(config.api_key.is_none());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        api_key: Some("secret".into()),
        tick_interval_secs: 12,
        backend: CaptureBackendType::StillImage,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(loaded, Config::default());
}

#[test]
fn test_partial_config_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "swap_model": "custom-image-model" }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.swap_model, "custom-image-model");
    assert_eq!(loaded.refine_model, Config::default().refine_model);
    assert_eq!(loaded.tick_interval(), Duration::from_secs(6));
}

#[test]
fn test_invalid_config_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_config_clamps_out_of_range_values() {
    let config = Config {
        tick_interval_secs: 0,
        jpeg_quality: 0,
        capture_timeout_secs: 0,
        request_timeout_secs: 0,
        ..Config::default()
    };
    assert_eq!(config.tick_interval(), Duration::from_millis(500));
    assert_eq!(config.jpeg_quality(), 1);
    assert_eq!(config.capture_timeout(), Duration::from_secs(1));
    assert_eq!(config.request_timeout(), Duration::from_secs(1));
}

#[test]
fn test_explicit_api_key_wins() {
    let config = Config {
        api_key: Some("from-config".into()),
        ..Config::default()
    };
    assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
}
