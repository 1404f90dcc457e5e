//! Waiting on server-side background tasks.

use std::future::IntoFuture;
use std::time::Duration;

use ferry_core::{BackgroundTask, RemoteResult, TaskRef};
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::backend::Backend;
use crate::command::{GetTask, execute};
use crate::session::Session;

/// Default delay between two task polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls task references to a terminal state.
#[derive(Debug, Clone)]
pub struct TaskBridge<B: Backend> {
    session: Session,
    backend: B,
    poll_interval: Duration,
}

impl<B: Backend> TaskBridge<B> {
    /// Bridge polling through `session` every `poll_interval`.
    #[must_use]
    pub const fn new(session: Session, backend: B, poll_interval: Duration) -> Self {
        Self {
            session,
            backend,
            poll_interval,
        }
    }

    /// Poll `task` until it reaches a terminal status.
    ///
    /// A `failed` task is returned as data, not raised.
    ///
    /// # Errors
    ///
    /// Returns an error only when polling itself fails.
    pub async fn wait(&self, task: &TaskRef) -> RemoteResult<BackgroundTask> {
        loop {
            let snapshot = execute(GetTask::new(self.backend.clone(), task.clone()), &self.session).await?;
            if snapshot.is_terminal() {
                debug!(task_id = %task, status = %snapshot.status, "task reached terminal state");
                return Ok(snapshot);
            }
            debug!(
                task_id = %task,
                status = %snapshot.status,
                progress = %snapshot.progress,
                "task still running"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Handle that polls `task` lazily when awaited.
    #[must_use]
    pub fn as_awaitable(&self, task: TaskRef) -> TaskHandle<B> {
        TaskHandle {
            bridge: self.clone(),
            task,
        }
    }
}

/// Deferred wait on one background task.
#[derive(Debug, Clone)]
pub struct TaskHandle<B: Backend> {
    bridge: TaskBridge<B>,
    task: TaskRef,
}

impl<B: Backend> TaskHandle<B> {
    /// Task this handle waits on.
    #[must_use]
    pub const fn task_ref(&self) -> &TaskRef {
        &self.task
    }

    /// Poll the task to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error when polling fails.
    pub async fn wait(self) -> RemoteResult<BackgroundTask> {
        self.bridge.wait(&self.task).await
    }
}

impl<B: Backend> IntoFuture for TaskHandle<B> {
    type Output = RemoteResult<BackgroundTask>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
