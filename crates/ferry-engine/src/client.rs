//! Async file client: the public operations over one backend.

use std::time::Duration;

use ferry_core::{
    BackgroundTask, BatchAction, BatchItem, FileHandle, RemotePath, RemoteResult, ResourceInfo,
    TaskRef,
};

use crate::backend::Backend;
use crate::batch::{BatchOptions, BatchOutcome, BatchResolver, DEFAULT_MAX_RESUMPTIONS};
use crate::command::{GetMetadata, OpenFile, Upload, execute, validate_name};
use crate::session::Session;
use crate::task::{DEFAULT_POLL_INTERVAL, TaskBridge, TaskHandle};

/// Polling and resumption limits shared by every call of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Delay between two task polls.
    pub poll_interval: Duration,
    /// Cap on conflict resumptions per batch call.
    pub max_resumptions: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_resumptions: DEFAULT_MAX_RESUMPTIONS,
        }
    }
}

/// Async operations against one backend.
#[derive(Debug, Clone)]
pub struct FileClient<B: Backend> {
    session: Session,
    backend: B,
    settings: ClientSettings,
}

impl<B: Backend> FileClient<B> {
    /// Client issuing requests through `session`.
    #[must_use]
    pub fn new(session: Session, backend: B) -> Self {
        Self {
            session,
            backend,
            settings: ClientSettings::default(),
        }
    }

    /// Replace the polling and resumption limits.
    #[must_use]
    pub const fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Backend descriptor.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    fn resolver(&self) -> BatchResolver<B> {
        BatchResolver::new(
            self.session.clone(),
            self.backend.clone(),
            self.settings.poll_interval,
        )
        .with_max_resumptions(self.settings.max_resumptions)
    }

    fn tasks(&self) -> TaskBridge<B> {
        TaskBridge::new(
            self.session.clone(),
            self.backend.clone(),
            self.settings.poll_interval,
        )
    }

    /// Copy items; items without their own target land in `destination`.
    ///
    /// Per-item failures, including an unresolved conflict when no resolver was
    /// supplied, come back inside `Ok(BatchOutcome::Completed(report))`. Call
    /// [`BatchReport::into_result`](crate::batch::BatchReport::into_result) on the report
    /// to get them raised as [`RemoteError::Conflict`](ferry_core::RemoteError::Conflict)
    /// with its cursor, or
    /// [`RemoteError::BatchFailed`](ferry_core::RemoteError::BatchFailed).
    ///
    /// # Errors
    ///
    /// Returns validation errors before any request and request-level failures after.
    pub async fn copy_items(
        &self,
        items: Vec<BatchItem<B::Path>>,
        destination: Option<&B::Path>,
        options: BatchOptions,
    ) -> RemoteResult<BatchOutcome<B>> {
        self.resolver()
            .run(BatchAction::Copy, items, destination, options)
            .await
    }

    /// Move items; same contract as [`Self::copy_items`], so per-item failures and an
    /// unresolved conflict are raised only through
    /// [`BatchReport::into_result`](crate::batch::BatchReport::into_result).
    ///
    /// # Errors
    ///
    /// Returns validation errors before any request and request-level failures after.
    pub async fn move_items(
        &self,
        items: Vec<BatchItem<B::Path>>,
        destination: Option<&B::Path>,
        options: BatchOptions,
    ) -> RemoteResult<BatchOutcome<B>> {
        self.resolver()
            .run(BatchAction::Move, items, destination, options)
            .await
    }

    /// Rename one item in place.
    ///
    /// # Errors
    ///
    /// Returns a validation error for names that are not a single segment.
    pub async fn rename(
        &self,
        path: &B::Path,
        new_name: &str,
        options: BatchOptions,
    ) -> RemoteResult<BatchOutcome<B>> {
        validate_name(new_name)?;
        let destination = path.parent().join(new_name)?;
        let item = BatchItem::to(path.clone(), destination);
        self.resolver()
            .run(BatchAction::Rename, vec![item], None, options)
            .await
    }

    /// Delete items and return the relative paths that were removed.
    ///
    /// With `wait` unset the tasks are only submitted and every requested path is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ferry_core::RemoteError::BatchFailed`] carrying each failed item's cause.
    pub async fn delete(&self, paths: Vec<B::Path>, wait: bool) -> RemoteResult<Vec<String>> {
        let requested: Vec<String> = paths.iter().map(|path| path.relative().to_string()).collect();
        let items = paths.into_iter().map(BatchItem::new).collect();
        let options = if wait {
            BatchOptions::default()
        } else {
            BatchOptions::default().no_wait()
        };
        match self
            .resolver()
            .run(BatchAction::Delete, items, None, options)
            .await?
        {
            BatchOutcome::Completed(report) => Ok(report
                .into_result()?
                .items
                .into_iter()
                .map(|item| item.source.relative().to_string())
                .collect()),
            BatchOutcome::Submitted(_) => Ok(requested),
        }
    }

    /// Poll a task to its terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error when polling fails; a failed task is returned as data.
    pub async fn wait(&self, task: &TaskRef) -> RemoteResult<BackgroundTask> {
        self.tasks().wait(task).await
    }

    /// Handle that polls `task` when awaited.
    #[must_use]
    pub fn as_awaitable(&self, task: TaskRef) -> TaskHandle<B> {
        self.tasks().as_awaitable(task)
    }

    /// Metadata of one resource.
    ///
    /// # Errors
    ///
    /// Returns [`ferry_core::RemoteError::ObjectNotFound`] for a missing resource.
    pub async fn metadata(&self, path: &B::Path) -> RemoteResult<ResourceInfo<B::Path>> {
        execute(
            GetMetadata::new(self.backend.clone(), path.clone()),
            &self.session,
        )
        .await
    }

    /// Open a file.
    ///
    /// # Errors
    ///
    /// Returns [`ferry_core::RemoteError::Open`] chaining the specific cause.
    pub async fn open(&self, path: &B::Path) -> RemoteResult<FileHandle<B::Path>> {
        execute(OpenFile::new(self.backend.clone(), path.clone()), &self.session).await
    }

    /// Upload `content` as `folder/name` and return the new path.
    ///
    /// # Errors
    ///
    /// Returns destination checks failures before sending any content, and quota or
    /// naming-policy rejections reported by the server.
    pub async fn upload(
        &self,
        folder: &B::Path,
        name: &str,
        content: Vec<u8>,
    ) -> RemoteResult<B::Path> {
        execute(
            Upload::new(self.backend.clone(), folder.clone(), name, content),
            &self.session,
        )
        .await
    }
}
