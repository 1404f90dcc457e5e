#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! Client configuration: typed model, defaults, validation, and a file + environment loader.
//!
//! Layout: `model.rs` (serde config sections), `defaults.rs` (fallback values),
//! `validate.rs` (field checks), `loader.rs` (JSON file and `FERRY_*` overrides),
//! `error.rs` (error taxonomy).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use model::{
    BackendKind, ClientConfig, EndpointConfig, LogFormatName, LoggingSettings, RetrySettings,
    TaskSettings,
};
pub use validate::validate_config;
