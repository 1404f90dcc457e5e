//! Subscriber installation for the CLI and embedding applications.
//!
//! # Design
//! - The fmt layer is chosen per format and boxed, so one registry chain serves both.
//! - Thread names are always recorded: blocking calls and the execution bridge worker
//!   log from different threads and the name is how the two are told apart.
//! - `RUST_LOG` overrides the configured level; a configured level that does not parse
//!   is an error rather than a silent fallback.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt as tfmt, prelude::*};

/// Level used when neither `RUST_LOG` nor configuration picks one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const UNKNOWN_BUILD: &str = "dev";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails when the configured level is not a valid filter directive or when a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if BUILD_SHA.set(config.build_sha.to_string()).is_err() {
        tracing::debug!("build identifier already recorded");
    }

    let filter = env_filter(config.level)?;
    let output = match config.format {
        LogFormat::Json => tfmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Pretty => tfmt::layer()
            .compact()
            .with_target(false)
            .with_thread_names(true)
            .boxed(),
    };
    let layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![output];

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber already installed: {err}"))?;

    tracing::debug!(
        build = build_sha(),
        format = %config.format,
        level = config.level,
        "logging ready"
    );
    Ok(())
}

/// Build identifier recorded by [`init_logging`], or `dev` before that.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or(UNKNOWN_BUILD, String::as_str)
}

/// Inputs for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive such as `info` or `ferry_engine=debug,info`.
    pub level: &'a str,
    /// Output encoding.
    pub format: LogFormat,
    /// Build identifier attached to the startup event.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: UNKNOWN_BUILD,
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Compact human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON for release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Lowercase name used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow!("unknown log format '{other}'")),
        }
    }
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))
}
