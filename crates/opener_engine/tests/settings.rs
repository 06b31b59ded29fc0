use std::fs;
use std::time::Duration;

use opener_engine::{ConfigError, OpenerSettings};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn defaults_match_the_documented_values() {
    let settings = OpenerSettings::default();

    assert_eq!(settings.target_host, "connect.bracu.ac.bd");
    assert_eq!(settings.excluded_url_prefixes, vec!["blob:".to_string()]);
    assert_eq!(settings.dedupe_window(), Duration::from_secs(10));
    assert_eq!(settings.retry_delay(), Duration::from_secs(1));
    assert_eq!(settings.reconnect_backoff(), Duration::from_secs(1));
    assert_eq!(settings.max_delivery_attempts, 3);
    assert!(settings.validate().is_ok());
    assert!(settings
        .host_pattern()
        .matches("https://connect.bracu.ac.bd/course/1"));
}

#[test]
fn partial_config_keeps_other_defaults() {
    let settings = OpenerSettings::from_ron_str(
        r#"(target_host: "lms.example.edu", retry_delay_ms: 250)"#,
    )
    .unwrap();

    assert_eq!(settings.target_host, "lms.example.edu");
    assert_eq!(settings.retry_delay(), Duration::from_millis(250));
    assert_eq!(settings.dedupe_window_ms, 10_000);
    assert_eq!(settings.page_script, "inject.js");
}

#[test]
fn invalid_values_are_rejected() {
    let empty_host = OpenerSettings::from_ron_str(r#"(target_host: "  ")"#);
    let zero_attempts = OpenerSettings::from_ron_str("(max_delivery_attempts: 0)");
    let empty_prefix = OpenerSettings::from_ron_str(r#"(excluded_url_prefixes: [""])"#);
    let garbage = OpenerSettings::from_ron_str("(target_host: 42)");

    assert!(matches!(empty_host, Err(ConfigError::Invalid(_))));
    assert!(matches!(zero_attempts, Err(ConfigError::Invalid(_))));
    assert!(matches!(empty_prefix, Err(ConfigError::Invalid(_))));
    assert!(matches!(garbage, Err(ConfigError::Parse(_))));
}

#[test]
fn load_reads_a_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("opener.ron");
    fs::write(&path, "(dedupe_window_ms: 5000)").unwrap();

    let settings = OpenerSettings::load(&path).unwrap();
    assert_eq!(settings.dedupe_window(), Duration::from_secs(5));

    let missing = OpenerSettings::load(&temp.path().join("absent.ron"));
    assert!(matches!(missing, Err(ConfigError::Read { .. })));
}
