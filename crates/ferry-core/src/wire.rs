//! Request and response bodies exchanged with both backends.

use serde::{Deserialize, Serialize};

use crate::model::{BatchAction, Cursor, ResourceKind, TaskRefs};

/// Result code of a successful upload.
pub const RC_OK: &str = "ok";
/// Result code when the account quota is exhausted.
pub const RC_QUOTA_EXCEEDED: &str = "quota_exceeded";
/// Result code when a name is refused by policy.
pub const RC_NAME_REJECTED: &str = "name_rejected";

/// Task failure code for an existing destination.
pub const CODE_CONFLICT: &str = "conflict";
/// Task failure code for a missing destination folder.
pub const CODE_DESTINATION_NOT_FOUND: &str = "destination_not_found";
/// Task failure code for a missing source.
pub const CODE_SOURCE_NOT_FOUND: &str = "source_not_found";

/// Body of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequestBody {
    /// Operation applied to every item.
    pub action: BatchAction,
    /// Items in caller order.
    pub items: Vec<WireItem>,
    /// Cursor of the interrupted run being resumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// One item of a batch submission, in the backend's wire path form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireItem {
    /// Source path.
    pub source: String,
    /// Destination path; omitted for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// Response to a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionBody {
    /// One aggregate reference or one per item.
    pub tasks: TaskRefs,
}

/// Metadata document for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBody {
    /// Scope-prefixed href of the resource.
    pub href: String,
    /// File or folder.
    pub kind: ResourceKind,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Whether the caller may write to it.
    #[serde(default)]
    pub writable: bool,
}

/// Response to an open call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBody {
    /// Scope-prefixed href of the opened file.
    pub href: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Server-issued handle.
    pub handle: String,
}

/// Body of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBody {
    /// Destination folder in wire form.
    pub folder: String,
    /// File name.
    pub name: String,
    /// Base64-encoded content.
    pub content: String,
}

/// Application result envelope returned by uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCodeBody {
    /// Result code.
    pub rc: String,
    /// Server message.
    #[serde(default)]
    pub message: String,
}
