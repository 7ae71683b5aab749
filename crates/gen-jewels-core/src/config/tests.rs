use super::*;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_empty_config_uses_defaults() {
    let config = ConfigLoader::from_str("").unwrap();

    assert_eq!(config.api.base_url, "http://localhost:8000");
    assert_eq!(config.api.timeout(), Duration::from_secs(30));
    assert_eq!(config.health.interval(), Duration::from_secs(60));
    assert_eq!(config.health.timeout(), Duration::from_secs(5));
    assert_eq!(config.logging.level, "info");

    let timings = config.session.timings();
    assert_eq!(timings.poll_interval, Duration::from_secs(3));
    assert_eq!(timings.recovery_timeout, Duration::from_secs(90));
    assert_eq!(timings.recency_window, chrono::Duration::seconds(120));
}

#[test]
fn test_partial_sections_keep_remaining_defaults() {
    let yaml = r#"
api:
  base_url: https://jewels.example.com
  extra_headers:
    ngrok-skip-browser-warning: "69420"
session:
  recovery_timeout_secs: 45
"#;
    let config = ConfigLoader::from_str(yaml).unwrap();

    assert_eq!(config.api.base_url, "https://jewels.example.com");
    assert_eq!(config.api.generation_timeout_secs, 600);
    assert_eq!(
        config.api.extra_headers.get("ngrok-skip-browser-warning").map(String::as_str),
        Some("69420")
    );
    assert_eq!(config.session.recovery_timeout_secs, 45);
    assert_eq!(config.session.poll_interval_secs, 3);
}

#[test]
fn test_rejects_non_http_base_url() {
    let err = ConfigLoader::from_str("api:\n  base_url: localhost:8000\n").unwrap_err();
    assert!(matches!(err, JewelsError::ConfigError(_)));
}

#[test]
fn test_rejects_poll_interval_longer_than_timeout() {
    let yaml = "session:\n  poll_interval_secs: 100\n  recovery_timeout_secs: 90\n";
    let err = ConfigLoader::from_str(yaml).unwrap_err();
    assert!(err.to_string().contains("poll_interval_secs"));
}

#[test]
fn test_rejects_invalid_header_name() {
    let yaml = "api:\n  extra_headers:\n    \"bad header\": x\n";
    assert!(ConfigLoader::from_str(yaml).is_err());
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let err = ConfigLoader::from_str("api: [unterminated").unwrap_err();
    assert!(matches!(err, JewelsError::ConfigError(_)));
}

#[test]
fn test_explicit_storage_path_wins() {
    let config = ConfigLoader::from_str("storage:\n  path: /tmp/jewels.json\n").unwrap();
    assert_eq!(
        config.storage.resolved_path().unwrap(),
        std::path::PathBuf::from("/tmp/jewels.json")
    );
}

#[tokio::test]
async fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "health:\n  interval_secs: 15").unwrap();

    let config = load_config(file.path()).await.unwrap();
    assert_eq!(config.health.interval_secs, 15);
}

#[tokio::test]
async fn test_missing_file_is_config_error() {
    let err = ConfigLoader::from_file("/nonexistent/gen-jewels.yaml").await.unwrap_err();
    assert!(matches!(err, JewelsError::ConfigError(_)));
}
