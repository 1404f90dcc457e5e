use async_trait::async_trait;
use ferry_core::{
    BackgroundTask, RemoteError, RemoteResult, Request, Response, TaskRef, TransportError,
};

use super::{Command, decode_body, translate_transport_error};
use crate::backend::Backend;

/// Fetch the current state of a background task.
#[derive(Debug, Clone)]
pub struct GetTask<B: Backend> {
    backend: B,
    task: TaskRef,
}

impl<B: Backend> GetTask<B> {
    /// Poll `task` once.
    pub const fn new(backend: B, task: TaskRef) -> Self {
        Self { backend, task }
    }
}

#[async_trait]
impl<B: Backend> Command for GetTask<B> {
    type Output = BackgroundTask;

    fn name(&self) -> &'static str {
        "get_task"
    }

    fn request(&self) -> RemoteResult<Request> {
        Ok(Request::get(self.backend.task_endpoint(&self.task)))
    }

    fn interpret(&self, response: Response) -> RemoteResult<BackgroundTask> {
        decode_body(self.name(), &response)
    }

    fn translate(&self, error: TransportError) -> RemoteError {
        match error {
            TransportError::Application { status: 404, .. } => RemoteError::TaskNotFound {
                task: self.task.to_string(),
            },
            other => translate_transport_error(self.name(), other, self.task.as_str()),
        }
    }
}
