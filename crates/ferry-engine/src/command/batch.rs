use async_trait::async_trait;
use ferry_core::wire::{BatchRequestBody, SubmissionBody, WireItem};
use ferry_core::{
    BatchAction, Cursor, RemoteError, RemotePath, RemoteResult, Request, ResolvedItem, Response,
    TaskRefs, TransportError,
};
use tracing::info;

use super::{Command, decode_body, encode_body, translate_transport_error};
use crate::backend::Backend;
use crate::session::Session;

/// Submit every item of a batch as one wire request.
#[derive(Debug, Clone)]
pub struct SubmitBatch<B: Backend> {
    backend: B,
    action: BatchAction,
    items: Vec<ResolvedItem<B::Path>>,
    cursor: Option<Cursor>,
}

impl<B: Backend> SubmitBatch<B> {
    /// Submission of `items`, resuming from `cursor` when given.
    pub const fn new(
        backend: B,
        action: BatchAction,
        items: Vec<ResolvedItem<B::Path>>,
        cursor: Option<Cursor>,
    ) -> Self {
        Self {
            backend,
            action,
            items,
            cursor,
        }
    }
}

#[async_trait]
impl<B: Backend> Command for SubmitBatch<B> {
    type Output = TaskRefs;

    fn name(&self) -> &'static str {
        "submit_batch"
    }

    fn validate(&self) -> RemoteResult<()> {
        if self.items.is_empty() {
            return Err(RemoteError::EmptyBatch);
        }
        if self.action.requires_destination()
            && let Some(item) = self.items.iter().find(|item| item.destination.is_none())
        {
            return Err(RemoteError::MissingDestination {
                item: item.source.to_string(),
            });
        }
        Ok(())
    }

    async fn before(&self, _session: &Session) -> RemoteResult<()> {
        info!(
            backend = self.backend.name(),
            action = %self.action,
            item_count = self.items.len(),
            resumed = self.cursor.is_some(),
            directive = self.cursor.as_ref().and_then(Cursor::directive).is_some(),
            "submitting batch"
        );
        Ok(())
    }

    fn request(&self) -> RemoteResult<Request> {
        let body = BatchRequestBody {
            action: self.action,
            items: self
                .items
                .iter()
                .map(|item| WireItem {
                    source: self.backend.wire_path(&item.source),
                    destination: item
                        .destination
                        .as_ref()
                        .map(|destination| self.backend.wire_path(destination)),
                })
                .collect(),
            cursor: self.cursor.clone(),
        };
        Ok(Request::post(
            self.backend.batch_endpoint(),
            encode_body(self.name(), &body)?,
        ))
    }

    fn interpret(&self, response: Response) -> RemoteResult<TaskRefs> {
        let body: SubmissionBody = decode_body(self.name(), &response)?;
        match &body.tasks {
            TaskRefs::PerItem(refs) if refs.len() != self.items.len() => {
                Err(RemoteError::UnexpectedResponse {
                    operation: self.name(),
                    detail: format!(
                        "{} task references for {} items",
                        refs.len(),
                        self.items.len()
                    ),
                })
            }
            _ => Ok(body.tasks),
        }
    }

    fn translate(&self, error: TransportError) -> RemoteError {
        let first = self
            .items
            .first()
            .map(|item| item.source.absolute())
            .unwrap_or_default();
        translate_transport_error(self.name(), error, &first)
    }
}
