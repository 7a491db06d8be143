//! Integration tests for configuration parsing
//!
//! Tests reader configuration files, including:
//! - Minimal and full configs
//! - Defaults for missing sections
//! - Invalid configuration handling
//! - Loading from disk

use reader::ReaderConfig;
use reader::usb::DetachPolicy;
use std::io::Write;
use std::time::Duration;

const FULL_CONFIG: &str = r#"
[reader]
log_level = "debug"

[usb]
timeout_ms = 2500
detach_policy = "auto"
"#;

#[test]
fn test_parse_full_config() {
    let config = ReaderConfig::parse(FULL_CONFIG).unwrap();

    assert_eq!(config.reader.log_level, "debug");
    assert_eq!(config.usb.timeout_ms, 2500);
    assert_eq!(config.usb.detach_policy, DetachPolicy::Auto);

    let options = config.session_options();
    assert_eq!(options.timeout, Duration::from_millis(2500));
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = ReaderConfig::parse("").unwrap();

    assert_eq!(config.reader.log_level, "warn");
    assert_eq!(config.usb.timeout_ms, 1000);
    assert_eq!(config.usb.detach_policy, DetachPolicy::Always);
}

#[test]
fn test_partial_usb_section() {
    let config = ReaderConfig::parse("[usb]\ntimeout_ms = 500\n").unwrap();

    assert_eq!(config.usb.timeout_ms, 500);
    assert_eq!(config.usb.detach_policy, DetachPolicy::Always);
}

#[test]
fn test_invalid_detach_policy() {
    assert!(ReaderConfig::parse("[usb]\ndetach_policy = \"never\"\n").is_err());
}

#[test]
fn test_invalid_log_level() {
    assert!(ReaderConfig::parse("[reader]\nlog_level = \"loud\"\n").is_err());
}

#[test]
fn test_zero_timeout_rejected() {
    assert!(ReaderConfig::parse("[usb]\ntimeout_ms = 0\n").is_err());
}

#[test]
fn test_negative_timeout_rejected() {
    assert!(ReaderConfig::parse("[usb]\ntimeout_ms = -5\n").is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();

    let config = ReaderConfig::load(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(config.usb.detach_policy, DetachPolicy::Auto);
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("reader.toml");

    let err = ReaderConfig::load(Some(missing)).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read config file"));
}

#[test]
fn test_load_invalid_file_reports_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[usb]\ntimeout_ms = \"soon\"\n").unwrap();

    let err = ReaderConfig::load(Some(file.path().to_path_buf())).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn test_default_path_location() {
    let path = ReaderConfig::default_path();
    assert!(path.ends_with("temper2/reader.toml"));
}
