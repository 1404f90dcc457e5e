//! CLI error type and the bridge-backed application context.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use anyhow::anyhow;
use ferry_config::{BackendKind, ClientConfig, ConfigError};
use ferry_core::RemoteError;
use ferry_engine::{ClientSettings, ExecutionBridge, RetryGovernor, Session};
use ferry_http::{HttpTransport, HttpTransportConfig};
use ferry_telemetry::Metrics;
use url::Url;

use crate::cli::OutputFormat;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) fn config(error: ConfigError) -> Self {
        match error {
            ConfigError::InvalidField {
                section,
                field,
                value,
                reason,
            } => Self::validation(match value {
                Some(value) => format!("invalid {section}.{field} '{value}': {reason}"),
                None => format!("invalid {section}.{field}: {reason}"),
            }),
            other => Self::failure(other),
        }
    }

    /// Local input problems exit with 2, everything the remote reports with 3.
    pub(crate) fn remote(error: RemoteError) -> Self {
        match error {
            RemoteError::PathValidation { .. }
            | RemoteError::MissingDestination { .. }
            | RemoteError::EmptyBatch => Self::Validation(format!("{:#}", anyhow::Error::new(error))),
            other => Self::failure(other),
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<RemoteError> for CliError {
    fn from(error: RemoteError) -> Self {
        Self::remote(error)
    }
}

/// Application context passed to command handlers.
#[derive(Debug, Clone)]
pub(crate) struct AppContext {
    pub(crate) backend: BackendKind,
    pub(crate) bridge: Arc<ExecutionBridge>,
    pub(crate) settings: ClientSettings,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Build the transport, session, and bridge described by `config`.
    pub(crate) fn from_config(config: &ClientConfig, output: OutputFormat) -> CliResult<Self> {
        let base_url: Url = config
            .endpoint
            .base_url
            .parse()
            .map_err(|err| CliError::validation(format!("invalid base URL: {err}")))?;
        let mut http = HttpTransportConfig::new(base_url)
            .with_timeout(config.endpoint.request_timeout());
        if let Some(api_key) = &config.endpoint.api_key {
            http = http.with_api_key(api_key.clone());
        }
        let transport = HttpTransport::new(http).map_err(CliError::failure)?;

        let retry = RetryGovernor::new(
            config.retry.max_retries,
            config.retry.backoff_base,
            config.retry.backoff_unit(),
            config.retry.call_timeout(),
        );
        let metrics =
            Metrics::new().map_err(|err| CliError::failure(anyhow!("metrics setup failed: {err}")))?;
        let session = Session::new(Arc::new(transport))
            .with_retry(retry)
            .with_metrics(metrics);

        let settings = ClientSettings {
            poll_interval: config.tasks.poll_interval(),
            max_resumptions: config.tasks.max_resumptions,
        };
        Self::with_session(session, config.endpoint.backend, settings, output)
    }

    /// Start a bridge over an already-built session.
    pub(crate) fn with_session(
        session: Session,
        backend: BackendKind,
        settings: ClientSettings,
        output: OutputFormat,
    ) -> CliResult<Self> {
        let bridge = ExecutionBridge::start("ferry-cli", session).map_err(CliError::failure)?;
        Ok(Self {
            backend,
            bridge: Arc::new(bridge),
            settings,
            output,
        })
    }
}
