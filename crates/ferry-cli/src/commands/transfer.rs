//! Batch commands: copy, move, rename, delete.

use ferry_core::{
    BatchItem, ConflictDisposition, ConflictResolutionPolicy, Cursor, RemotePath, RemoteResult,
};
use ferry_engine::{Backend, BatchOptions, BatchOutcome, BlockingFileClient};
use tracing::debug;

use super::{Rendered, parse_path};
use crate::cli::{BatchFlags, DeleteArgs, OutputFormat, RenameArgs, TransferArgs};
use crate::client::{CliError, CliResult};
use crate::output::{format_removed, format_report, format_task_refs};

pub(crate) fn handle_copy<B: Backend>(
    client: &BlockingFileClient<B>,
    args: TransferArgs,
    format: OutputFormat,
) -> CliResult<Rendered> {
    let (items, to, options) = prepare::<B::Path>(&args)?;
    let outcome = client.copy_items(items, to, options);
    render_outcome(outcome, format)
}

pub(crate) fn handle_move<B: Backend>(
    client: &BlockingFileClient<B>,
    args: TransferArgs,
    format: OutputFormat,
) -> CliResult<Rendered> {
    let (items, to, options) = prepare::<B::Path>(&args)?;
    let outcome = client.move_items(items, to, options);
    render_outcome(outcome, format)
}

pub(crate) fn handle_rename<B: Backend>(
    client: &BlockingFileClient<B>,
    args: RenameArgs,
    format: OutputFormat,
) -> CliResult<Rendered> {
    let path = parse_path::<B::Path>(&args.path)?;
    let outcome = client.rename(path, args.name, batch_options(&args.batch));
    render_outcome(outcome, format)
}

pub(crate) fn handle_delete<B: Backend>(
    client: &BlockingFileClient<B>,
    args: DeleteArgs,
    format: OutputFormat,
) -> CliResult<Rendered> {
    let paths = args
        .paths
        .iter()
        .map(|raw| parse_path::<B::Path>(raw))
        .collect::<CliResult<Vec<_>>>()?;
    let removed = client.delete(paths, !args.no_wait)?;
    Ok(Rendered::ok(format_removed(&removed, format)?))
}

type Prepared<P> = (Vec<BatchItem<P>>, Option<P>, BatchOptions);

fn prepare<P: RemotePath>(args: &TransferArgs) -> CliResult<Prepared<P>> {
    let items = args
        .items
        .iter()
        .map(|raw| parse_entry::<P>(raw))
        .collect::<CliResult<Vec<_>>>()?;
    let to = args.to.as_deref().map(parse_path::<P>).transpose()?;
    debug!(items = items.len(), has_fallback = to.is_some(), "prepared batch arguments");
    Ok((items, to, batch_options(&args.batch)))
}

/// `source`, `source=destination`, or `source=folder/`.
fn parse_entry<P: RemotePath>(raw: &str) -> CliResult<BatchItem<P>> {
    let Some((source, target)) = raw.split_once('=') else {
        return Ok(BatchItem::new(parse_path(raw)?));
    };
    if source.is_empty() || target.is_empty() {
        return Err(CliError::validation(format!(
            "'{raw}' must be written as source=destination"
        )));
    }
    let source = parse_path(source)?;
    let destination = parse_path(target)?;
    if target.ends_with('/') {
        Ok(BatchItem::into_dir(source, destination))
    } else {
        Ok(BatchItem::to(source, destination))
    }
}

fn batch_options(flags: &BatchFlags) -> BatchOptions {
    let mut options = BatchOptions::default();
    if let Some(answer) = flags.on_conflict {
        options = options.with_resolver(ConflictResolutionPolicy::uniform(
            ConflictDisposition::from(answer),
        ));
    }
    if let Some(token) = &flags.cursor {
        options = options.with_cursor(Cursor::new(token.clone()));
    }
    if flags.no_wait {
        options = options.no_wait();
    }
    options
}

fn render_outcome<B: Backend>(
    outcome: RemoteResult<BatchOutcome<B>>,
    format: OutputFormat,
) -> CliResult<Rendered> {
    match outcome? {
        BatchOutcome::Completed(report) => {
            let text = format_report(&report, format)?;
            let failure = report.into_result().err().map(CliError::from);
            Ok(Rendered { text, failure })
        }
        BatchOutcome::Submitted(handles) => {
            let refs: Vec<String> = handles
                .iter()
                .map(|handle| handle.task_ref().to_string())
                .collect();
            Ok(Rendered::ok(format_task_refs(&refs, format)?))
        }
    }
}
