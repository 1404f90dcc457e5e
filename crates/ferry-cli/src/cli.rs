//! Argument parsing, configuration layering, and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ferry_config::{BackendKind, ClientConfig, ConfigLoader, LogFormatName};
use ferry_core::ConflictDisposition;
use ferry_telemetry::{LogFormat, LoggingConfig, init_logging};
use tracing::info_span;
use uuid::Uuid;

use crate::client::{AppContext, CliError, CliResult};
use crate::commands;

/// Parse arguments, run the requested command, and return the process exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn execute(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli.global)?;
    install_logging(&config);

    let trace_id = Uuid::new_v4();
    let span = info_span!("ferry", trace_id = %trace_id, command = cli.command.label());
    let _entered = span.enter();

    let ctx = AppContext::from_config(&config, cli.global.output)?;
    commands::dispatch(&ctx, cli.command)
}

fn load_config(global: &GlobalArgs) -> CliResult<ClientConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &global.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().map_err(CliError::config)?;

    if let Some(base_url) = &global.base_url {
        config.endpoint.base_url.clone_from(base_url);
    }
    if let Some(backend) = global.backend {
        config.endpoint.backend = backend.into();
    }
    if let Some(api_key) = &global.api_key {
        config.endpoint.api_key = Some(api_key.clone());
    }
    ferry_config::validate_config(&config).map_err(CliError::config)?;
    Ok(config)
}

fn install_logging(config: &ClientConfig) {
    let format = match config.logging.format {
        Some(LogFormatName::Json) => LogFormat::Json,
        Some(LogFormatName::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    let logging = LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: option_env!("FERRY_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err:#}");
    }
}

#[derive(Parser)]
#[command(name = "ferry", about = "Copy, move, and manage files on a remote file service")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct GlobalArgs {
    /// JSON configuration file.
    #[arg(long, global = true, env = "FERRY_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    /// Base URL of the remote endpoint.
    #[arg(long, global = true)]
    pub(crate) base_url: Option<String>,
    /// Remote dialect.
    #[arg(long, global = true, value_enum)]
    pub(crate) backend: Option<BackendArg>,
    /// API key sent with every request.
    #[arg(long, global = true)]
    pub(crate) api_key: Option<String>,
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) output: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum BackendArg {
    Service,
    Device,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Service => Self::Service,
            BackendArg::Device => Self::Device,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ConflictArg {
    Skip,
    Overwrite,
    KeepBoth,
}

impl From<ConflictArg> for ConflictDisposition {
    fn from(value: ConflictArg) -> Self {
        match value {
            ConflictArg::Skip => Self::Skip,
            ConflictArg::Overwrite => Self::Overwrite,
            ConflictArg::KeepBoth => Self::KeepBoth,
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Copy items; `src=dst` pairs name their own target, a trailing `/` marks a folder.
    Copy(TransferArgs),
    /// Move items; same forms as `copy`.
    Move(TransferArgs),
    /// Rename one item in place.
    Rename(RenameArgs),
    /// Delete items.
    Delete(DeleteArgs),
    /// Wait for a background task to finish.
    Wait(WaitArgs),
    /// Show metadata for one item.
    Stat(StatArgs),
}

impl Command {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Self::Copy(_) => "copy",
            Self::Move(_) => "move",
            Self::Rename(_) => "rename",
            Self::Delete(_) => "delete",
            Self::Wait(_) => "wait",
            Self::Stat(_) => "stat",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct BatchFlags {
    /// Answer to destination conflicts; without it conflicts stop the batch.
    #[arg(long, value_enum)]
    pub(crate) on_conflict: Option<ConflictArg>,
    /// Resume an interrupted batch from this cursor token.
    #[arg(long)]
    pub(crate) cursor: Option<String>,
    /// Print task references instead of waiting.
    #[arg(long)]
    pub(crate) no_wait: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct TransferArgs {
    /// Sources, or `source=destination` pairs.
    #[arg(required = true)]
    pub(crate) items: Vec<String>,
    /// Folder receiving items without their own destination.
    #[arg(long)]
    pub(crate) to: Option<String>,
    #[command(flatten)]
    pub(crate) batch: BatchFlags,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RenameArgs {
    /// Item to rename.
    pub(crate) path: String,
    /// New final segment.
    pub(crate) name: String,
    #[command(flatten)]
    pub(crate) batch: BatchFlags,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct DeleteArgs {
    /// Items to delete.
    #[arg(required = true)]
    pub(crate) paths: Vec<String>,
    /// Return after submission.
    #[arg(long)]
    pub(crate) no_wait: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct WaitArgs {
    /// Task reference printed by a `--no-wait` call.
    pub(crate) task: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct StatArgs {
    /// Item to describe.
    pub(crate) path: String,
}
