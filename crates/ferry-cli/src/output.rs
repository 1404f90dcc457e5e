//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use ferry_core::{BackgroundTask, RemoteError, RemotePath, ResourceInfo, ResourceKind};
use ferry_engine::{BatchReport, ItemOutcome};
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

pub(crate) fn emit(text: &str) {
    println!("{text}");
}

fn to_json(value: &Value) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

const fn outcome_label(outcome: &ItemOutcome) -> &'static str {
    match outcome {
        ItemOutcome::Pending => "pending",
        ItemOutcome::Succeeded => "succeeded",
        ItemOutcome::Failed(_) => "failed",
    }
}

fn describe(error: &RemoteError) -> String {
    let mut text = format!("{:#}", anyhow::Error::new(error.clone()));
    if let Some(cursor) = error.cursor() {
        let _ = write!(text, " (cursor {})", cursor.token());
    }
    text
}

pub(crate) fn format_report<P: RemotePath>(
    report: &BatchReport<P>,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => {
            let items: Vec<Value> = report
                .items
                .iter()
                .map(|item| {
                    let mut entry = json!({
                        "source": item.source.to_string(),
                        "destination": item.destination.as_ref().map(ToString::to_string),
                        "outcome": outcome_label(&item.outcome),
                    });
                    if let ItemOutcome::Failed(err) = &item.outcome {
                        entry["error"] = json!(format!("{:#}", anyhow::Error::new(err.clone())));
                        if let Some(cursor) = err.cursor() {
                            entry["cursor"] = json!(cursor.token());
                        }
                    }
                    entry
                })
                .collect();
            to_json(&json!({
                "action": report.action.as_str(),
                "resumptions": report.resumptions,
                "tasks": report.tasks.iter().map(|task| task.id.to_string()).collect::<Vec<_>>(),
                "items": items,
            }))
        }
        OutputFormat::Table => {
            let mut text = format!("{:<10} {:<40} DESTINATION", "OUTCOME", "SOURCE");
            for item in &report.items {
                let destination = item
                    .destination
                    .as_ref()
                    .map_or_else(|| "-".to_string(), ToString::to_string);
                let _ = write!(
                    text,
                    "\n{:<10} {:<40} {destination}",
                    outcome_label(&item.outcome),
                    item.source
                );
                if let ItemOutcome::Failed(err) = &item.outcome {
                    let _ = write!(text, "\n           {}", describe(err));
                }
            }
            if report.resumptions > 0 {
                let _ = write!(text, "\nresumed after {} conflict(s)", report.resumptions);
            }
            Ok(text)
        }
    }
}

pub(crate) fn format_task_refs(refs: &[String], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&json!({ "tasks": refs })),
        OutputFormat::Table => Ok(refs.join("\n")),
    }
}

pub(crate) fn format_task(task: &BackgroundTask, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(task)
            .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}"))),
        OutputFormat::Table => {
            let mut text = format!("id: {}\nstatus: {}", task.id, task.status);
            if !task.progress.is_empty() {
                let _ = write!(text, "\nprogress: {}", task.progress);
            }
            for failure in &task.failures {
                let _ = write!(
                    text,
                    "\nfailure: {} {} {}",
                    failure.code,
                    failure.path.as_deref().unwrap_or("-"),
                    failure.message
                );
            }
            if let Some(cursor) = &task.cursor {
                let _ = write!(text, "\ncursor: {}", cursor.token());
            }
            Ok(text)
        }
    }
}

pub(crate) fn format_resource<P: RemotePath>(
    info: &ResourceInfo<P>,
    format: OutputFormat,
) -> CliResult<String> {
    let kind = match info.kind {
        ResourceKind::File => "file",
        ResourceKind::Folder => "folder",
    };
    match format {
        OutputFormat::Json => to_json(&json!({
            "path": info.path.to_string(),
            "absolute": info.path.absolute(),
            "kind": kind,
            "size": info.size,
            "writable": info.writable,
        })),
        OutputFormat::Table => Ok(format!(
            "path: {}\nkind: {kind}\nsize: {}\nwritable: {}",
            info.path.absolute(),
            format_bytes(info.size),
            info.writable
        )),
    }
}

pub(crate) fn format_removed(paths: &[String], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&json!({ "removed": paths })),
        OutputFormat::Table => Ok(paths
            .iter()
            .map(|path| format!("removed {path}"))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{BatchAction, Cursor, DevicePath};
    use ferry_engine::ItemReport;

    fn report() -> Result<BatchReport<DevicePath>, ferry_core::PathError> {
        Ok(BatchReport {
            action: BatchAction::Copy,
            items: vec![
                ItemReport {
                    source: DevicePath::new("in/a.txt")?,
                    destination: Some(DevicePath::new("out/a.txt")?),
                    outcome: ItemOutcome::Failed(RemoteError::Conflict {
                        path: Some("/share/in/a.txt".into()),
                        cursor: Cursor::new("c-9"),
                    }),
                },
                ItemReport {
                    source: DevicePath::new("in/b.txt")?,
                    destination: Some(DevicePath::new("out/b.txt")?),
                    outcome: ItemOutcome::Pending,
                },
            ],
            tasks: Vec::new(),
            resumptions: 0,
        })
    }

    #[test]
    fn table_report_shows_the_cursor_to_resume_from() -> Result<(), Box<dyn std::error::Error>> {
        let text = format_report(&report()?, OutputFormat::Table)
            .map_err(|err| err.display_message())?;
        assert!(text.contains("failed"));
        assert!(text.contains("cursor c-9"));
        assert!(text.contains("pending    in/b.txt"));
        Ok(())
    }

    #[test]
    fn json_report_lists_every_item() -> Result<(), Box<dyn std::error::Error>> {
        let text = format_report(&report()?, OutputFormat::Json)
            .map_err(|err| err.display_message())?;
        let value: Value = serde_json::from_str(&text)?;
        assert_eq!(value["action"], "copy");
        assert_eq!(value["items"][0]["cursor"], "c-9");
        assert_eq!(value["items"][1]["outcome"], "pending");
        Ok(())
    }

    #[test]
    fn bytes_are_humanised() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
