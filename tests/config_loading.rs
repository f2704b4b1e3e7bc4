//! Configuration file loading tests

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use websecscan::app::cli::config::{AppConfig, ConfigError};
use websecscan::catalog::ScanTypeCatalog;
use websecscan::core::error_handling::ContextualError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_load_explicit_file() {
    let file = config_file(
        r#"
        engine-url = "http://zap.internal:8090"
        api-key = "s3cret"
        poll-interval = 2000
        exclude-url = ".*/billing/.*"

        [profiles.spider]
        expected-duration = 1800
        "#,
    );

    let config = AppConfig::load(Some(file.path())).await.unwrap();
    assert_eq!(config.source.as_deref(), Some(file.path()));
    assert_eq!(config.engine_url, "http://zap.internal:8090");
    assert_eq!(config.poll_interval, Duration::from_secs(2));

    let zap = config.zap_config();
    assert_eq!(zap.base_url, "http://zap.internal:8090");
    assert_eq!(zap.api_key.as_deref(), Some("s3cret"));

    let session = config.session_config();
    assert_eq!(session.poll_interval, Duration::from_secs(2));
    assert_eq!(session.default_exclusions.last().unwrap(), ".*/billing/.*");

    let catalog = ScanTypeCatalog::with_overrides(&config.profile_durations).unwrap();
    assert_eq!(catalog.lookup("spider").unwrap().expected_duration_secs(), 1800);
}

#[tokio::test]
async fn test_malformed_file_is_reported() {
    let file = config_file("engine-url = \"http://zap:8080\n");
    let err = AppConfig::load(Some(file.path())).await.unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }));
    assert!(err.is_user_actionable());
    assert!(err.user_message().unwrap().contains("Error parsing configuration file"));
}

#[tokio::test]
async fn test_invalid_value_is_reported() {
    let file = config_file("request-timeout = \"soon\"\n");
    let err = AppConfig::load(Some(file.path())).await.unwrap_err();
    assert_eq!(
        err,
        ConfigError::InvalidValue {
            key: "request-timeout".to_string(),
            message: "Invalid value for 'request-timeout': expected a positive integer"
                .to_string(),
        }
    );
}

#[tokio::test]
async fn test_missing_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let err = AppConfig::load(Some(missing.as_path())).await.unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { ref path, .. } if *path == missing));
}

#[test]
fn test_default_path_location() {
    if let Some(path) = AppConfig::default_path() {
        assert!(path.ends_with("WebSecScan/websecscan.toml"));
    }
}
