//! Command handlers grouped by concern.
//!
//! Handlers are generic over the backend and return what to print plus an optional
//! failure, so partial results reach the terminal before the exit code does.

mod inspect;
mod transfer;

use ferry_config::BackendKind;
use ferry_core::RemotePath;
use ferry_engine::{Backend, BlockingFileClient, DeviceBackend, ServiceBackend};

use crate::cli::{Command, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::emit;

/// Rendered result of one command.
#[derive(Debug)]
pub(crate) struct Rendered {
    pub(crate) text: String,
    pub(crate) failure: Option<CliError>,
}

impl Rendered {
    pub(crate) const fn ok(text: String) -> Self {
        Self {
            text,
            failure: None,
        }
    }
}

pub(crate) fn dispatch(ctx: &AppContext, command: Command) -> CliResult<()> {
    let rendered = match ctx.backend {
        BackendKind::Service => run_on(ctx, ServiceBackend, command)?,
        BackendKind::Device => run_on(ctx, DeviceBackend, command)?,
    };
    if !rendered.text.is_empty() {
        emit(&rendered.text);
    }
    rendered.failure.map_or(Ok(()), Err)
}

pub(crate) fn run_on<B: Backend>(
    ctx: &AppContext,
    backend: B,
    command: Command,
) -> CliResult<Rendered> {
    let client = BlockingFileClient::new(ctx.bridge.clone(), backend).with_settings(ctx.settings);
    let format: OutputFormat = ctx.output;
    match command {
        Command::Copy(args) => transfer::handle_copy(&client, args, format),
        Command::Move(args) => transfer::handle_move(&client, args, format),
        Command::Rename(args) => transfer::handle_rename(&client, args, format),
        Command::Delete(args) => transfer::handle_delete(&client, args, format),
        Command::Wait(args) => inspect::handle_wait(&client, &args, format),
        Command::Stat(args) => inspect::handle_stat(&client, &args, format),
    }
}

/// Parse a raw path argument; a trailing `/` is accepted and ignored.
pub(crate) fn parse_path<P: RemotePath>(raw: &str) -> CliResult<P> {
    let trimmed = if raw.len() > 1 {
        raw.trim_end_matches('/')
    } else {
        raw
    };
    trimmed
        .parse::<P>()
        .map_err(|err| CliError::remote(err.into()))
}
