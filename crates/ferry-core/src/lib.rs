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

//! Backend-agnostic path model, DTOs, and error taxonomy for remote file operations.
//!
//! Layout: `path/` (service and device path variants), `model/` (cursors, conflict
//! policies, batch items, background tasks), `error.rs` (domain errors), `transport.rs`
//! (the transport contract), `wire.rs` (request and response bodies).

pub mod error;
pub mod model;
pub mod path;
pub mod transport;
pub mod wire;

pub use error::{ItemFailure, RemoteError, RemoteResult};
pub use model::{
    BackgroundTask, BatchAction, BatchItem, ConflictDisposition, ConflictResolutionPolicy,
    Cursor, FailureCause, FileHandle, ResolutionDirective, ResolvedItem, ResourceInfo,
    ResourceKind, Target, TaskFailure, TaskRef, TaskRefs, TaskStatus,
};
pub use path::{
    DEVICE_ROOT, DevicePath, PathError, PathResult, RemotePath, SERVICE_WEBDAV_PREFIX,
    ServiceNamespace, ServicePath,
};
pub use transport::{Method, Request, Response, Transport, TransportError};
