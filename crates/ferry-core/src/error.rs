//! Error taxonomy for remote file operations.

use thiserror::Error;

use crate::model::{BatchAction, Cursor};
use crate::path::PathError;
use crate::transport::TransportError;

/// Primary error type for remote operations.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// A path failed local validation; raised before any network call.
    #[error("path validation failed")]
    PathValidation {
        /// Underlying path error.
        #[from]
        source: PathError,
    },
    /// A batch item could not be resolved to a destination.
    #[error("batch item has no destination")]
    MissingDestination {
        /// Source of the item lacking a destination.
        item: String,
    },
    /// A batch call listed no items.
    #[error("batch has no items")]
    EmptyBatch,
    /// Transient transport failure that outlived every retry.
    #[error("transient transport failure")]
    Transient {
        /// Operation identifier.
        operation: &'static str,
        /// Calls issued, including the first.
        attempts: u32,
        /// Last transport failure.
        #[source]
        source: TransportError,
    },
    /// Application-level failure with no more specific mapping.
    #[error("remote application error")]
    Application {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status.
        status: u16,
        /// Application error code when supplied.
        code: Option<String>,
        /// Server message.
        message: String,
    },
    /// The addressed object does not exist.
    #[error("object not found")]
    ObjectNotFound {
        /// Path of the missing object.
        path: String,
    },
    /// The destination folder does not exist.
    #[error("destination folder not found")]
    DestinationNotFound {
        /// Path of the missing folder.
        path: String,
    },
    /// A file could not be opened.
    #[error("failed to open file")]
    Open {
        /// Path that was being opened.
        path: String,
        /// More specific cause.
        #[source]
        cause: Box<RemoteError>,
    },
    /// The caller lacks permission for the resource.
    #[error("permission denied")]
    PermissionDenied {
        /// Path that was refused.
        path: String,
    },
    /// The destination folder exists but is not writable.
    #[error("destination is read-only")]
    ReadOnlyDestination {
        /// Read-only folder.
        path: String,
    },
    /// The destination exists but is a file.
    #[error("destination is not a folder")]
    NotAFolder {
        /// Offending path.
        path: String,
    },
    /// The server rejected an upload because the quota is exhausted.
    #[error("storage quota exceeded")]
    QuotaExceeded {
        /// Upload destination folder.
        path: String,
        /// Server message.
        message: String,
    },
    /// The server rejected a name by policy.
    #[error("name rejected by server policy")]
    NameRejected {
        /// Rejected name.
        name: String,
        /// Server message.
        message: String,
    },
    /// A destination already exists; the cursor resumes the batch.
    #[error("destination already exists")]
    Conflict {
        /// Conflicting item when the server names it.
        path: Option<String>,
        /// Resumption cursor.
        cursor: Cursor,
    },
    /// A task stopped for a non-conflict reason.
    #[error("remote operation failed")]
    OperationFailed {
        /// Failing item when the server names it.
        path: Option<String>,
        /// Application error code.
        code: String,
        /// Server message.
        message: String,
        /// Cursor reported alongside the failure; diagnostic only.
        cursor: Option<Cursor>,
    },
    /// One or more batch items did not succeed.
    #[error("batch finished with failed items")]
    BatchFailed {
        /// Batch action.
        action: BatchAction,
        /// Every item that did not succeed.
        failures: Vec<ItemFailure>,
    },
    /// An item was never processed because an earlier item stopped its task.
    #[error("item was not reached")]
    NotReached {
        /// Source of the unprocessed item.
        path: String,
    },
    /// The server has no record of the task.
    #[error("task not found")]
    TaskNotFound {
        /// Task identifier.
        task: String,
    },
    /// A request body could not be encoded.
    #[error("failed to encode request")]
    Encoding {
        /// Operation identifier.
        operation: &'static str,
        /// Encoder failure detail.
        detail: String,
    },
    /// A response did not match the expected shape.
    #[error("unexpected response")]
    UnexpectedResponse {
        /// Operation identifier.
        operation: &'static str,
        /// Description of the mismatch.
        detail: String,
    },
    /// A batch kept reporting conflicts past the resumption cap.
    #[error("resumption limit reached")]
    ResumptionLimit {
        /// Configured cap.
        limit: u32,
    },
    /// A command value was executed twice.
    #[error("command already executed")]
    CommandReused {
        /// Command name.
        command: &'static str,
    },
    /// The execution bridge worker could not be started.
    #[error("execution bridge failed to start")]
    BridgeStartup {
        /// Startup failure detail.
        detail: String,
    },
    /// The execution bridge no longer accepts work.
    #[error("execution bridge is closed")]
    BridgeClosed,
    /// The execution bridge dropped a job without answering.
    #[error("execution bridge lost the job")]
    BridgeJobLost,
    /// A blocking call was issued from the bridge's own scheduler thread.
    #[error("blocking call issued from the execution bridge scheduler")]
    BlockingInAsyncContext,
}

impl RemoteError {
    /// Resumption or diagnostic cursor carried by the error.
    #[must_use]
    pub const fn cursor(&self) -> Option<&Cursor> {
        match self {
            Self::Conflict { cursor, .. } => Some(cursor),
            Self::OperationFailed { cursor, .. } => cursor.as_ref(),
            _ => None,
        }
    }

    /// Whether the error is a resumable conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Terminal failure of one batch item.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    /// Item source in its raw string form.
    pub source: String,
    /// Resolved destination, when the action has one.
    pub destination: Option<String>,
    /// Attributed error.
    pub error: RemoteError,
}

/// Convenience alias for remote operation results.
pub type RemoteResult<T> = Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn open_chains_specific_cause() {
        let err = RemoteError::Open {
            path: "/share/a".into(),
            cause: Box::new(RemoteError::ObjectNotFound {
                path: "/share/a".into(),
            }),
        };
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("object not found"));
    }

    #[test]
    fn cursor_accessor_covers_conflict_and_failure() {
        let conflict = RemoteError::Conflict {
            path: None,
            cursor: Cursor::new("c-1"),
        };
        assert!(conflict.is_conflict());
        assert_eq!(conflict.cursor().map(Cursor::token), Some("c-1"));

        let failed = RemoteError::OperationFailed {
            path: None,
            code: "io".into(),
            message: "disk".into(),
            cursor: None,
        };
        assert!(!failed.is_conflict());
        assert!(failed.cursor().is_none());
    }

    #[test]
    fn path_errors_convert() {
        let err: RemoteError = PathError::EscapesScope { path: "..".into() }.into();
        assert!(matches!(err, RemoteError::PathValidation { .. }));
    }
}
