use std::fs;

use ferry_config::{BackendKind, ConfigError, ConfigLoader, LogFormatName};

#[test]
fn file_values_are_overridden_by_environment() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ferry.json");
    fs::write(
        &path,
        r#"{
            "endpoint": {"base_url": "https://files.example.com", "backend": "service"},
            "retry": {"max_retries": 5, "backoff_unit_ms": 250},
            "logging": {"level": "debug", "format": "pretty"}
        }"#,
    )?;

    let config = ConfigLoader::new()
        .with_file(&path)
        .with_env(|key| match key {
            "FERRY_BACKEND" => Some("device".into()),
            "FERRY_API_KEY" => Some("key:secret".into()),
            _ => None,
        })
        .load()?;

    assert_eq!(config.endpoint.base_url, "https://files.example.com");
    assert_eq!(config.endpoint.backend, BackendKind::Device);
    assert_eq!(config.endpoint.api_key.as_deref(), Some("key:secret"));
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.backoff_unit().as_millis(), 250);
    assert_eq!(config.retry.backoff_base, 2);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, Some(LogFormatName::Pretty));
    Ok(())
}

#[test]
fn malformed_file_reports_parse_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json")?;

    let result = ConfigLoader::new().with_file(&path).with_env(|_| None).load();
    assert!(matches!(result, Err(ConfigError::Parse { path: reported, .. }) if reported == path));
    Ok(())
}

#[test]
fn merged_result_is_validated() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ferry.json");
    fs::write(&path, r#"{"retry": {"call_timeout_secs": 0}}"#)?;

    let result = ConfigLoader::new().with_file(&path).with_env(|_| None).load();
    assert!(matches!(
        result,
        Err(ConfigError::InvalidField {
            section: "retry",
            field: "call_timeout_secs",
            ..
        })
    ));
    Ok(())
}
