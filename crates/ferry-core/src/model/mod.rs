//! Batch, task, and cursor DTOs shared by the engine, the transports, and the CLI.
//!
//! # Design
//! - Cursors stay opaque: the token is round-tripped verbatim and only the resolution
//!   directive is ever attached or removed.
//! - Submission responses are decoded once into [`TaskRefs`]; nothing downstream
//!   inspects the raw JSON shape again.
//! - Path-carrying types are generic over the backend's path variant.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::{CODE_CONFLICT, CODE_DESTINATION_NOT_FOUND, CODE_SOURCE_NOT_FOUND};

/// How a conflicting destination should be treated when a batch resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDisposition {
    /// Leave the existing destination untouched and drop the item.
    Skip,
    /// Replace the existing destination.
    Overwrite,
    /// Keep both by writing the item under a fresh name.
    KeepBoth,
}

impl ConflictDisposition {
    /// Wire spelling of the disposition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::KeepBoth => "keep_both",
        }
    }
}

/// The one typed field a client may attach to a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDirective {
    /// Disposition applied to the conflicting item.
    pub disposition: ConflictDisposition,
    /// Whether the server should reuse the disposition for later conflicts of the batch.
    #[serde(default)]
    pub apply_to_all: bool,
}

/// Opaque, server-issued resumption token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolution: Option<ResolutionDirective>,
}

impl Cursor {
    /// Wrap a token exactly as the server issued it.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            resolution: None,
        }
    }

    /// The raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Directive currently attached, if any.
    #[must_use]
    pub const fn directive(&self) -> Option<ResolutionDirective> {
        self.resolution
    }

    /// Copy of the cursor carrying `directive`; the token is untouched.
    #[must_use]
    pub fn with_directive(&self, directive: ResolutionDirective) -> Self {
        Self {
            token: self.token.clone(),
            resolution: Some(directive),
        }
    }

    /// Copy of the cursor with any directive removed.
    #[must_use]
    pub fn without_directive(&self) -> Self {
        Self::new(self.token.clone())
    }
}

impl Display for Cursor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.token)
    }
}

type PathResolver = Arc<dyn Fn(&str) -> ConflictDisposition + Send + Sync>;

/// Caller-supplied answer to conflicts, built once per batch and reused across resumptions.
#[derive(Clone)]
pub enum ConflictResolutionPolicy {
    /// Apply one disposition to every conflicting item.
    Uniform(ConflictDisposition),
    /// Ask the callback for each conflicting item, keyed by its absolute source path.
    PerPath(PathResolver),
}

impl ConflictResolutionPolicy {
    /// Blanket policy.
    #[must_use]
    pub const fn uniform(disposition: ConflictDisposition) -> Self {
        Self::Uniform(disposition)
    }

    /// Per-path policy backed by `resolver`.
    #[must_use]
    pub fn per_path<F>(resolver: F) -> Self
    where
        F: Fn(&str) -> ConflictDisposition + Send + Sync + 'static,
    {
        Self::PerPath(Arc::new(resolver))
    }

    /// Directive to fold into the resumption cursor for a conflict on `path`.
    ///
    /// Per-path policies cannot answer a conflict that names no item and yield `None`.
    #[must_use]
    pub fn directive_for(&self, path: Option<&str>) -> Option<ResolutionDirective> {
        match (self, path) {
            (Self::Uniform(disposition), _) => Some(ResolutionDirective {
                disposition: *disposition,
                apply_to_all: true,
            }),
            (Self::PerPath(resolver), Some(path)) => Some(ResolutionDirective {
                disposition: resolver(path),
                apply_to_all: false,
            }),
            (Self::PerPath(_), None) => None,
        }
    }
}

impl fmt::Debug for ConflictResolutionPolicy {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(disposition) => formatter
                .debug_tuple("Uniform")
                .field(disposition)
                .finish(),
            Self::PerPath(_) => formatter.write_str("PerPath(..)"),
        }
    }
}

/// Server-issued identifier of a background job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRef(String);

impl TaskRef {
    /// Wrap a raw task identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Shape of a batch submission response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskRefs {
    /// One task covering every item; the server fans out internally.
    Aggregate(TaskRef),
    /// One task per submitted item, in submission order.
    PerItem(Vec<TaskRef>),
}

impl TaskRefs {
    /// Number of task references.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Aggregate(_) => 1,
            Self::PerItem(refs) => refs.len(),
        }
    }

    /// Whether the response carried no references at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list, preserving order.
    #[must_use]
    pub fn into_vec(self) -> Vec<TaskRef> {
        match self {
            Self::Aggregate(task) => vec![task],
            Self::PerItem(refs) => refs,
        }
    }
}

/// Lifecycle state of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued on the server.
    Pending,
    /// Currently executing.
    Running,
    /// Finished without failures.
    Completed,
    /// Finished, but some items failed.
    CompletedWithWarnings,
    /// Stopped; `cursor` is set when the stop was caused by a conflict.
    Failed,
}

impl TaskStatus {
    /// Whether polling can stop.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithWarnings | Self::Failed
        )
    }

    /// Wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithWarnings => "completed_with_warnings",
            Self::Failed => "failed",
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure classes the engine distinguishes in task error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// Destination already exists.
    Conflict,
    /// Destination folder is missing.
    DestinationNotFound,
    /// Source item is missing.
    SourceNotFound,
    /// Anything else.
    Other,
}

/// One failure entry reported by a background task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Application error code.
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Wire form of the failing item's source path, when the server names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl TaskFailure {
    /// Classify the error code.
    #[must_use]
    pub fn cause(&self) -> FailureCause {
        match self.code.as_str() {
            CODE_CONFLICT => FailureCause::Conflict,
            CODE_DESTINATION_NOT_FOUND => FailureCause::DestinationNotFound,
            CODE_SOURCE_NOT_FOUND => FailureCause::SourceNotFound,
            _ => FailureCause::Other,
        }
    }
}

/// Local mirror of a server-side background job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundTask {
    /// Task identifier.
    pub id: TaskRef,
    /// Current state.
    pub status: TaskStatus,
    /// Progress text supplied by the server.
    #[serde(default)]
    pub progress: String,
    /// Per-item failures recorded so far.
    #[serde(default)]
    pub failures: Vec<TaskFailure>,
    /// Resumption cursor, present when a conflict stopped the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    /// Start time, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BackgroundTask {
    /// Whether the task reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Multi-item operations understood by the batch endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    /// Duplicate items into a destination.
    Copy,
    /// Relocate items.
    Move,
    /// Give a single item a new name in place.
    Rename,
    /// Remove items.
    Delete,
}

impl BatchAction {
    /// Whether each item needs a resolved destination.
    #[must_use]
    pub const fn requires_destination(self) -> bool {
        !matches!(self, Self::Delete)
    }

    /// Wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Rename => "rename",
            Self::Delete => "delete",
        }
    }
}

impl Display for BatchAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Where a batch item should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<P> {
    /// A folder; the source name is appended.
    Directory(P),
    /// A full destination path. A scope root is treated as [`Target::Directory`].
    Exact(P),
}

/// One requested item of a batch, before destination resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem<P> {
    /// Item to act on.
    pub source: P,
    /// Explicit target; falls back to the call-level destination when absent.
    pub target: Option<Target<P>>,
}

impl<P> BatchItem<P> {
    /// Item with no explicit target.
    pub const fn new(source: P) -> Self {
        Self {
            source,
            target: None,
        }
    }

    /// Item with an exact destination.
    pub const fn to(source: P, destination: P) -> Self {
        Self {
            source,
            target: Some(Target::Exact(destination)),
        }
    }

    /// Item landing inside `directory` under its own name.
    pub const fn into_dir(source: P, directory: P) -> Self {
        Self {
            source,
            target: Some(Target::Directory(directory)),
        }
    }
}

impl<P> From<P> for BatchItem<P> {
    fn from(source: P) -> Self {
        Self::new(source)
    }
}

impl<P> From<(P, P)> for BatchItem<P> {
    fn from((source, destination): (P, P)) -> Self {
        Self::to(source, destination)
    }
}

/// A batch item after destination resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem<P> {
    /// Item to act on.
    pub source: P,
    /// Final destination; `None` only for deletes.
    pub destination: Option<P>,
}

/// Kind of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Regular file.
    File,
    /// Folder.
    Folder,
}

/// Metadata of one remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo<P> {
    /// Resource path.
    pub path: P,
    /// File or folder.
    pub kind: ResourceKind,
    /// Size in bytes; zero for folders.
    pub size: u64,
    /// Whether the caller may write into or over the resource.
    pub writable: bool,
}

/// Handle to an opened remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle<P> {
    /// Opened path.
    pub path: P,
    /// Size in bytes.
    pub size: u64,
    /// Server-issued handle.
    pub handle: String,
}
