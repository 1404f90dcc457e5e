//! Field checks applied after every source has been merged.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ClientConfig;

/// Check that `config` describes a usable client.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first field that fails.
pub fn validate_config(config: &ClientConfig) -> ConfigResult<()> {
    validate_base_url(&config.endpoint.base_url)?;
    if config.endpoint.request_timeout_secs == 0 {
        return Err(invalid("endpoint", "request_timeout_secs", "0", "must be positive"));
    }
    if config
        .endpoint
        .api_key
        .as_deref()
        .is_some_and(|key| key.trim().is_empty())
    {
        return Err(ConfigError::InvalidField {
            section: "endpoint",
            field: "api_key",
            value: None,
            reason: "must not be blank",
        });
    }

    let retry = &config.retry;
    if retry.backoff_base == 0 {
        return Err(invalid("retry", "backoff_base", "0", "must be at least 1"));
    }
    if retry.backoff_unit_ms == 0 {
        return Err(invalid("retry", "backoff_unit_ms", "0", "must be positive"));
    }
    if retry.call_timeout_secs == 0 {
        return Err(invalid("retry", "call_timeout_secs", "0", "must be positive"));
    }

    if config.tasks.poll_interval_ms == 0 {
        return Err(invalid("tasks", "poll_interval_ms", "0", "must be positive"));
    }
    if config.logging.level.trim().is_empty() {
        return Err(invalid("logging", "level", "", "must not be empty"));
    }
    Ok(())
}

fn validate_base_url(raw: &str) -> ConfigResult<()> {
    let url = Url::parse(raw).map_err(|_| invalid("endpoint", "base_url", raw, "not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("endpoint", "base_url", raw, "scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("endpoint", "base_url", raw, "host is missing"));
    }
    Ok(())
}

fn invalid(
    section: &'static str,
    field: &'static str,
    value: &str,
    reason: &'static str,
) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field,
        value: Some(value.to_string()),
        reason,
    }
}
