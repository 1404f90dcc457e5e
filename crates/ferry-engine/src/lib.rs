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

//! Remote-operation engine: command lifecycle, retries, resumable batches, task polling,
//! and the blocking execution bridge.
//!
//! Layout: `backend.rs` (endpoint layout per backend family), `session.rs` (transport plus
//! retry policy), `retry.rs` (retry governor), `command/` (lifecycle and concrete commands),
//! `task.rs` (task bridge), `batch.rs` (batch resolver), `client.rs` (async client),
//! `bridge.rs` (execution bridge), `blocking.rs` (blocking client).

pub mod backend;
pub mod batch;
pub mod blocking;
pub mod bridge;
pub mod client;
pub mod command;
pub mod retry;
pub mod session;
pub mod task;

pub use backend::{Backend, DeviceBackend, ServiceBackend};
pub use batch::{
    BatchOptions, BatchOutcome, BatchReport, BatchResolver, ItemOutcome, ItemReport,
    resolve_items,
};
pub use blocking::BlockingFileClient;
pub use bridge::ExecutionBridge;
pub use client::{ClientSettings, FileClient};
pub use command::{Command, CommandState, Invocation, execute};
pub use retry::RetryGovernor;
pub use session::Session;
pub use task::{TaskBridge, TaskHandle};
