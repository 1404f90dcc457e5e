//! Synchronous file client delegating every call to an [`ExecutionBridge`].

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use ferry_core::{BackgroundTask, BatchItem, FileHandle, RemoteResult, ResourceInfo, TaskRef};

use crate::backend::Backend;
use crate::batch::{BatchOptions, BatchOutcome};
use crate::bridge::ExecutionBridge;
use crate::client::{ClientSettings, FileClient};
use crate::task::TaskHandle;

/// Blocking twin of [`FileClient`]; callable from any thread.
#[derive(Debug, Clone)]
pub struct BlockingFileClient<B: Backend> {
    bridge: Arc<ExecutionBridge>,
    backend: B,
    settings: ClientSettings,
}

impl<B: Backend> BlockingFileClient<B> {
    /// Client running its calls on `bridge`.
    #[must_use]
    pub fn new(bridge: Arc<ExecutionBridge>, backend: B) -> Self {
        Self {
            bridge,
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

    fn run<T, F, Fut>(&self, work: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(FileClient<B>) -> Fut + Send + 'static,
        Fut: Future<Output = RemoteResult<T>> + Send + 'static,
    {
        let backend = self.backend.clone();
        let settings = self.settings;
        self.bridge.call(move |session| {
            Box::pin(work(FileClient::new(session, backend).with_settings(settings)))
        })
    }

    /// Blocking [`FileClient::copy_items`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::copy_items`].
    pub fn copy_items(
        &self,
        items: Vec<BatchItem<B::Path>>,
        destination: Option<B::Path>,
        options: BatchOptions,
    ) -> RemoteResult<BatchOutcome<B>> {
        self.run(move |client| async move {
            client
                .copy_items(items, destination.as_ref(), options)
                .await
        })
    }

    /// Blocking [`FileClient::move_items`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::move_items`].
    pub fn move_items(
        &self,
        items: Vec<BatchItem<B::Path>>,
        destination: Option<B::Path>,
        options: BatchOptions,
    ) -> RemoteResult<BatchOutcome<B>> {
        self.run(move |client| async move {
            client
                .move_items(items, destination.as_ref(), options)
                .await
        })
    }

    /// Blocking [`FileClient::rename`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::rename`].
    pub fn rename(
        &self,
        path: B::Path,
        new_name: impl Into<String>,
        options: BatchOptions,
    ) -> RemoteResult<BatchOutcome<B>> {
        let new_name = new_name.into();
        self.run(move |client| async move { client.rename(&path, &new_name, options).await })
    }

    /// Blocking [`FileClient::delete`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::delete`].
    pub fn delete(&self, paths: Vec<B::Path>, wait: bool) -> RemoteResult<Vec<String>> {
        self.run(move |client| async move { client.delete(paths, wait).await })
    }

    /// Blocking [`FileClient::wait`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::wait`].
    pub fn wait(&self, task: TaskRef) -> RemoteResult<BackgroundTask> {
        self.run(move |client| async move { client.wait(&task).await })
    }

    /// Handle for `task`; resolve it with [`Self::wait_handle`] or await it elsewhere.
    ///
    /// # Errors
    ///
    /// Returns a bridge failure when the worker is gone.
    pub fn as_awaitable(&self, task: TaskRef) -> RemoteResult<TaskHandle<B>> {
        self.run(move |client| async move { Ok(client.as_awaitable(task)) })
    }

    /// Resolve a handle returned by a non-waiting call.
    ///
    /// # Errors
    ///
    /// Returns an error when polling fails.
    pub fn wait_handle(&self, handle: TaskHandle<B>) -> RemoteResult<BackgroundTask> {
        self.bridge.call(move |_| handle.into_future())
    }

    /// Blocking [`FileClient::metadata`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::metadata`].
    pub fn metadata(&self, path: B::Path) -> RemoteResult<ResourceInfo<B::Path>> {
        self.run(move |client| async move { client.metadata(&path).await })
    }

    /// Blocking [`FileClient::open`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::open`].
    pub fn open(&self, path: B::Path) -> RemoteResult<FileHandle<B::Path>> {
        self.run(move |client| async move { client.open(&path).await })
    }

    /// Blocking [`FileClient::upload`].
    ///
    /// # Errors
    ///
    /// See [`FileClient::upload`].
    pub fn upload(
        &self,
        folder: B::Path,
        name: impl Into<String>,
        content: Vec<u8>,
    ) -> RemoteResult<B::Path> {
        let name = name.into();
        self.run(move |client| async move { client.upload(&folder, &name, content).await })
    }
}
