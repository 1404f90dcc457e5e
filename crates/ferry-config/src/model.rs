//! Typed configuration sections.
//!
//! # Design
//! - Every section has a complete default, so a partial file or no file at all is valid.
//! - Durations are stored as integer units on the wire and exposed as [`Duration`].

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_UNIT_MS, DEFAULT_BASE_URL, DEFAULT_CALL_TIMEOUT_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_RESUMPTIONS, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Where requests go.
    pub endpoint: EndpointConfig,
    /// Transient-failure handling.
    pub retry: RetrySettings,
    /// Background task polling.
    pub tasks: TaskSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Which remote dialect the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Multi-tenant service with namespaced paths.
    #[default]
    Service,
    /// Single embedded device rooted at `/share`.
    Device,
}

impl BackendKind {
    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Device => "device",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "device" => Ok(Self::Device),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Endpoint connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Remote dialect.
    pub backend: BackendKind,
    /// API key sent with every call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Client-side HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            backend: BackendKind::default(),
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl EndpointConfig {
    /// Client-side HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Retry governor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Retries after the first call.
    pub max_retries: u32,
    /// Backoff base; retry `n` sleeps `unit * base^2 * n`.
    pub backoff_base: u32,
    /// Backoff unit in milliseconds.
    pub backoff_unit_ms: u64,
    /// Per-call deadline in seconds.
    pub call_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_unit_ms: DEFAULT_BACKOFF_UNIT_MS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}

impl RetrySettings {
    /// Backoff unit.
    #[must_use]
    pub const fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Per-call deadline.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Background task settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskSettings {
    /// Delay between polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Cap on conflict resumptions per batch call.
    pub max_resumptions: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_resumptions: DEFAULT_MAX_RESUMPTIONS,
        }
    }
}

impl TaskSettings {
    /// Delay between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormatName {
    /// Human-readable multi-line output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormatName {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Level directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format; inferred from the build profile when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormatName>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_in_defaults() -> Result<(), serde_json::Error> {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoint": {"backend": "device"}, "tasks": {"max_resumptions": 4}}"#)?;
        assert_eq!(config.endpoint.backend, BackendKind::Device);
        assert_eq!(config.endpoint.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.tasks.max_resumptions, 4);
        assert_eq!(config.tasks.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.retry, RetrySettings::default());
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_str::<ClientConfig>(r#"{"retry": {"attempts": 3}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("Device".parse::<BackendKind>(), Ok(BackendKind::Device));
        assert_eq!(" JSON ".parse::<LogFormatName>(), Ok(LogFormatName::Json));
        assert!("cloud".parse::<BackendKind>().is_err());
    }
}
