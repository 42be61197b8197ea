use std::fs::write;
use std::time::Duration;
use tempfile::NamedTempFile;

use up_print_core::config::{GraphConfig, DEFAULT_CHUNK_SIZE};

/// Present keys override the defaults; everything else keeps its default.
#[test]
fn test_load_config_overrides_only_present_keys() {
    let config_yaml = r#"
base_url: "https://graph.microsoft.com/beta/"
chunk_size: 1048576
prefer_share_scope: false
poll:
  interval_secs: 2
share_discovery:
  attempts: 5
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = up_print::load_config::load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.base(), "https://graph.microsoft.com/beta");
    assert_eq!(config.chunk_size, 1024 * 1024);
    assert!(!config.prefer_share_scope);
    assert!(config.apply_printer_defaults);
    assert_eq!(config.poll.interval, Duration::from_secs(2));
    assert_eq!(config.poll.timeout, Duration::from_secs(600));
    assert_eq!(config.share_discovery.attempts, 5);
    assert_eq!(config.share_discovery.backoff, Duration::from_secs(2));
    assert_eq!(config.timeouts.upload, Duration::from_secs(300));
}

/// An empty file is accepted and yields the defaults.
#[test]
fn test_load_config_empty_file_is_all_defaults() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "").unwrap();

    let config = up_print::load_config::load_config(config_file.path()).expect("Empty config loads");
    let defaults = GraphConfig::default();
    assert_eq!(config.base_url, defaults.base_url);
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(config.required_roles, defaults.required_roles);
}

/// A misspelled key is an error rather than a silent default.
#[test]
fn test_load_config_rejects_unknown_keys() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "chunk_sise: 10\n").unwrap();

    let err = up_print::load_config::load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("parse"), "Parse error expected, got: {err}");
}

#[test]
fn test_load_config_rejects_zero_chunk_size() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "chunk_size: 0\n").unwrap();

    let err = up_print::load_config::load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("chunk_size"));
}

#[test]
fn test_load_config_rejects_zero_poll_interval() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "poll:\n  interval_secs: 0\n").unwrap();

    let err = up_print::load_config::load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("poll.interval_secs"));
}

/// This test ensures that if the config file is not valid YAML, load_config errors and reports as such.
#[test]
fn test_load_config_errors_for_invalid_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"not-yaml: [:::").unwrap();

    let err = up_print::load_config::load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn test_load_config_missing_file_names_the_path() {
    let err = up_print::load_config::load_config("/no/such/up-print.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
