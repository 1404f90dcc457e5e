//! Command lifecycle shared by the async and blocking entry points.
//!
//! # Design
//! - A command owns its parameters; the request is built only when the command runs.
//! - Hooks run in a fixed order: `validate`, `before`, transport call, then `interpret`
//!   on success or `translate` on failure, and finally `after` on the success path only.
//! - An [`Invocation`] is single-use; resuming a batch builds a fresh command.
//! - Transient failures reach callers as [`RemoteError::Transient`] once the retry
//!   governor gives up; `translate` only ever sees non-transient failures.

mod batch;
mod files;
mod task;

pub use batch::SubmitBatch;
pub use files::{GetMetadata, OpenFile, Upload};
pub(crate) use files::validate_name;
pub use task::GetTask;

use async_trait::async_trait;
use ferry_core::{RemoteError, RemoteResult, Request, Response, TransportError};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::session::Session;

/// One remote operation.
#[async_trait]
pub trait Command: Send + Sync {
    /// Value produced on success.
    type Output: Send + 'static;

    /// Operation identifier used in logs, metrics, and errors.
    fn name(&self) -> &'static str;

    /// Local checks run before anything else.
    ///
    /// # Errors
    ///
    /// Returns a validation error to abort the command.
    fn validate(&self) -> RemoteResult<()> {
        Ok(())
    }

    /// Pre-flight hook; an error short-circuits the transport call.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the command.
    async fn before(&self, _session: &Session) -> RemoteResult<()> {
        Ok(())
    }

    /// Build the transport request.
    ///
    /// # Errors
    ///
    /// Returns an error when the request body cannot be encoded.
    fn request(&self) -> RemoteResult<Request>;

    /// Turn a successful response into the output, or into an application-level error.
    ///
    /// # Errors
    ///
    /// Returns a domain error derived from the response body.
    fn interpret(&self, response: Response) -> RemoteResult<Self::Output>;

    /// Map a non-transient transport failure to a domain error.
    fn translate(&self, error: TransportError) -> RemoteError;

    /// Post-success hook.
    fn after(&self, _output: &Self::Output) {}
}

/// Execution state of an [`Invocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Not run yet.
    NotStarted,
    /// Currently running.
    Executing,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// A command paired with its execution state.
#[derive(Debug)]
pub struct Invocation<C> {
    command: C,
    state: CommandState,
}

impl<C: Command> Invocation<C> {
    /// Wrap a command that has not run yet.
    pub const fn new(command: C) -> Self {
        Self {
            command,
            state: CommandState::NotStarted,
        }
    }

    /// Current state.
    pub const fn state(&self) -> CommandState {
        self.state
    }

    /// Wrapped command.
    pub const fn command(&self) -> &C {
        &self.command
    }

    /// Run the command once.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::CommandReused`] on a second run, otherwise whatever the
    /// lifecycle produced.
    pub async fn run(&mut self, session: &Session) -> RemoteResult<C::Output> {
        if self.state != CommandState::NotStarted {
            return Err(RemoteError::CommandReused {
                command: self.command.name(),
            });
        }
        self.state = CommandState::Executing;
        let result = drive(&self.command, session).await;
        self.state = if result.is_ok() {
            CommandState::Completed
        } else {
            CommandState::Failed
        };
        if let Some(metrics) = session.metrics() {
            metrics.inc_command(self.command.name(), result.is_ok());
        }
        result
    }
}

/// Run `command` once against `session`.
///
/// # Errors
///
/// Returns the error produced by the command lifecycle.
pub async fn execute<C: Command>(command: C, session: &Session) -> RemoteResult<C::Output> {
    Invocation::new(command).run(session).await
}

async fn drive<C: Command>(command: &C, session: &Session) -> RemoteResult<C::Output> {
    let name = command.name();
    command.validate()?;
    command.before(session).await?;
    let request = command.request()?;
    debug!(command = name, method = request.method.as_str(), path = %request.path, "executing command");

    let response = match session.call(name, &request).await {
        Ok(response) => response,
        Err(err) if err.is_transient() => {
            return Err(RemoteError::Transient {
                operation: name,
                attempts: session.retry().max_attempts(),
                source: err,
            });
        }
        Err(err) => {
            debug!(command = name, error = %err, "command transport call failed");
            return Err(command.translate(err));
        }
    };

    let output = command.interpret(response)?;
    command.after(&output);
    Ok(output)
}

/// Default mapping of a transport failure for an operation addressing `path`.
#[must_use]
pub fn translate_transport_error(
    operation: &'static str,
    error: TransportError,
    path: &str,
) -> RemoteError {
    match error {
        TransportError::Application { status: 404, .. } => RemoteError::ObjectNotFound {
            path: path.to_string(),
        },
        TransportError::Application {
            status: 401 | 403, ..
        } => RemoteError::PermissionDenied {
            path: path.to_string(),
        },
        TransportError::Application {
            status,
            code,
            message,
        } => RemoteError::Application {
            operation,
            status,
            code,
            message,
        },
        TransportError::Protocol { detail } => RemoteError::UnexpectedResponse { operation, detail },
        transient @ (TransportError::Connection { .. } | TransportError::Timeout { .. }) => {
            RemoteError::Transient {
                operation,
                attempts: 1,
                source: transient,
            }
        }
    }
}

pub(crate) fn decode_body<T: DeserializeOwned>(
    operation: &'static str,
    response: &Response,
) -> RemoteResult<T> {
    response
        .decode()
        .map_err(|err| RemoteError::UnexpectedResponse {
            operation,
            detail: err.to_string(),
        })
}

pub(crate) fn encode_body<T: serde::Serialize>(
    operation: &'static str,
    body: &T,
) -> RemoteResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|err| RemoteError::Encoding {
        operation,
        detail: err.to_string(),
    })
}
