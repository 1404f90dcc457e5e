//! Read-only commands: wait, stat.

use anyhow::anyhow;
use ferry_core::{TaskRef, TaskStatus};
use ferry_engine::{Backend, BlockingFileClient};

use super::{Rendered, parse_path};
use crate::cli::{OutputFormat, StatArgs, WaitArgs};
use crate::client::{CliError, CliResult};
use crate::output::{format_resource, format_task};

pub(crate) fn handle_wait<B: Backend>(
    client: &BlockingFileClient<B>,
    args: &WaitArgs,
    format: OutputFormat,
) -> CliResult<Rendered> {
    if args.task.trim().is_empty() {
        return Err(CliError::validation("task reference must not be empty"));
    }
    let task = client.wait(TaskRef::new(args.task.trim()))?;
    let text = format_task(&task, format)?;
    let failure = (task.status != TaskStatus::Completed).then(|| {
        CliError::failure(anyhow!("task {} finished with status {}", task.id, task.status))
    });
    Ok(Rendered { text, failure })
}

pub(crate) fn handle_stat<B: Backend>(
    client: &BlockingFileClient<B>,
    args: &StatArgs,
    format: OutputFormat,
) -> CliResult<Rendered> {
    let path = parse_path::<B::Path>(&args.path)?;
    let info = client.metadata(path)?;
    Ok(Rendered::ok(format_resource(&info, format)?))
}
