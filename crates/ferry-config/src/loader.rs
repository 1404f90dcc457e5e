//! Layered loading: defaults, then an optional JSON file, then `FERRY_*` variables.
//!
//! # Design
//! - The environment is read through an injected lookup, so callers and tests decide what
//!   "the environment" is.
//! - Validation runs once, on the merged result.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{BackendKind, ClientConfig, LogFormatName};
use crate::validate::validate_config;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "FERRY_";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builder for a [`ClientConfig`].
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: EnvLookup,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConfigLoader")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl ConfigLoader {
    /// Loader reading the process environment and no file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            file: None,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Read `path` before applying environment overrides.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Replace the environment lookup.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Merge every source and validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed, an override cannot be
    /// parsed, or the merged configuration is invalid.
    pub fn load(&self) -> ConfigResult<ClientConfig> {
        let mut config = match &self.file {
            Some(path) => read_file(path)?,
            None => ClientConfig::default(),
        };
        self.apply_env(&mut config)?;
        validate_config(&config)?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.env)(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
    }

    fn apply_env(&self, config: &mut ClientConfig) -> ConfigResult<()> {
        if let Some(value) = self.var("BASE_URL") {
            config.endpoint.base_url = value.trim().to_string();
        }
        if let Some(value) = self.var("BACKEND") {
            config.endpoint.backend = parse::<BackendKind>("endpoint", "backend", &value)?;
        }
        if let Some(value) = self.var("API_KEY") {
            config.endpoint.api_key = Some(value);
        }
        if let Some(value) = self.var("MAX_RETRIES") {
            config.retry.max_retries = parse("retry", "max_retries", &value)?;
        }
        if let Some(value) = self.var("POLL_INTERVAL_MS") {
            config.tasks.poll_interval_ms = parse("tasks", "poll_interval_ms", &value)?;
        }
        if let Some(value) = self.var("LOG_LEVEL") {
            config.logging.level = value.trim().to_string();
        }
        if let Some(value) = self.var("LOG_FORMAT") {
            config.logging.format = Some(parse::<LogFormatName>("logging", "format", &value)?);
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> ConfigResult<ClientConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration file");
    Ok(config)
}

fn parse<T: FromStr>(section: &'static str, field: &'static str, raw: &str) -> ConfigResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidField {
            section,
            field,
            value: Some(raw.to_string()),
            reason: "environment override could not be parsed",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() -> ConfigResult<()> {
        let config = ConfigLoader::new()
            .with_env(env(&[
                ("FERRY_BACKEND", "device"),
                ("FERRY_MAX_RETRIES", "0"),
                ("FERRY_LOG_FORMAT", "json"),
                ("FERRY_BASE_URL", ""),
            ]))
            .load()?;
        assert_eq!(config.endpoint.backend, BackendKind::Device);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.logging.format, Some(LogFormatName::Json));
        assert_eq!(config.endpoint.base_url, crate::defaults::DEFAULT_BASE_URL);
        Ok(())
    }

    #[test]
    fn unparsable_override_names_the_field() {
        let result = ConfigLoader::new()
            .with_env(env(&[("FERRY_POLL_INTERVAL_MS", "soon")]))
            .load();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                section: "tasks",
                field: "poll_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = ConfigLoader::new()
            .with_env(env(&[]))
            .with_file("/definitely/not/here.json")
            .load();
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
