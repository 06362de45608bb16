//! Argument parsing, logging setup, and command dispatch.

use std::path::PathBuf;

use adbx_telemetry::{DEFAULT_LOG_LEVEL, GlobalContextGuard, LogFormat, LoggingConfig, init_logging};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands::{devices, files, transfer, trash};
use crate::context::{AppContext, CliError, CliResult};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: option_env!("ADBX_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }
    let _context = GlobalContextGuard::new(command_label(&cli.command));

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = adbx_config::load(cli.config.as_deref())
        .map_err(|err| CliError::validation(format!("configuration: {err}")))?;
    let ctx = AppContext::connect(config, cli.device, cli.output).await;
    let result = execute(&ctx, cli.command).await;
    ctx.engine.shutdown().await;
    result
}

pub(crate) async fn execute(ctx: &AppContext, command: Command) -> CliResult<()> {
    ctx.ensure_tool()?;
    match command {
        Command::Devices => devices::handle_devices(ctx).await,
        Command::Ls(args) => files::handle_ls(ctx, args).await,
        Command::Cat(args) => files::handle_cat(ctx, args).await,
        Command::Mkdir(args) => files::handle_mkdir(ctx, args).await,
        Command::Touch(args) => files::handle_touch(ctx, args).await,
        Command::Append(args) => files::handle_append(ctx, args).await,
        Command::Mv(args) => files::handle_mv(ctx, args).await,
        Command::Rename(args) => files::handle_rename(ctx, args).await,
        Command::Rm(args) => files::handle_rm(ctx, args).await,
        Command::Push(args) => transfer::handle_push(ctx, args).await,
        Command::Pull(args) => transfer::handle_pull(ctx, args).await,
        Command::Trash(args) => trash::handle_trash(ctx, args).await,
        Command::Restore(args) => trash::handle_restore(ctx, args).await,
        Command::TrashList => trash::handle_trash_list(ctx).await,
        Command::EmptyTrash => trash::handle_empty_trash(ctx).await,
    }
}

#[derive(Parser)]
#[command(name = "adbx", version, about = "File operations on Android devices over adb")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "ADBX_CONFIG", help = "TOML configuration file")]
    pub(crate) config: Option<PathBuf>,
    #[arg(
        short = 's',
        long,
        global = true,
        env = "ADBX_DEVICE",
        help = "Device serial; defaults to the only attached device"
    )]
    pub(crate) device: Option<String>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, global = true, env = "ADBX_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "ADBX_LOG_FORMAT", value_parser = parse_log_format)]
    pub(crate) log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List attached devices.
    Devices,
    /// List a remote directory.
    Ls(LsArgs),
    /// Print a remote file.
    Cat(PathArgs),
    /// Create remote directories, including parents.
    Mkdir(PathsArgs),
    /// Create an empty remote file or update its timestamp.
    Touch(PathArgs),
    /// Append one line to a remote file.
    Append(AppendArgs),
    /// Move remote items.
    Mv(MoveArgs),
    /// Rename a remote item in place.
    Rename(RenameArgs),
    /// Delete remote items permanently.
    Rm(PathsArgs),
    /// Copy host items to the device.
    Push(TransferArgs),
    /// Copy device items to the host.
    Pull(TransferArgs),
    /// Move remote items to the recycle bin.
    Trash(PathsArgs),
    /// Put trashed items back where they came from.
    Restore(RestoreArgs),
    /// List the recycle bin.
    TrashList,
    /// Delete everything in the recycle bin.
    EmptyTrash,
}

#[derive(Args)]
pub(crate) struct LsArgs {
    #[arg(default_value = "/sdcard")]
    pub(crate) path: String,
    #[arg(short, long, help = "Include hidden entries")]
    pub(crate) all: bool,
}

#[derive(Args)]
pub(crate) struct PathArgs {
    pub(crate) path: String,
}

#[derive(Args)]
pub(crate) struct PathsArgs {
    #[arg(required = true)]
    pub(crate) paths: Vec<String>,
}

#[derive(Args)]
pub(crate) struct AppendArgs {
    pub(crate) path: String,
    pub(crate) text: String,
}

#[derive(Args)]
pub(crate) struct MoveArgs {
    #[arg(required = true, num_args = 1..)]
    pub(crate) sources: Vec<String>,
    #[arg(help = "Target path, or an existing directory to move into")]
    pub(crate) destination: String,
}

#[derive(Args)]
pub(crate) struct RenameArgs {
    pub(crate) path: String,
    pub(crate) new_name: String,
}

#[derive(Args)]
pub(crate) struct TransferArgs {
    #[arg(required = true, num_args = 1..)]
    pub(crate) sources: Vec<String>,
    #[arg(help = "Directory receiving the items")]
    pub(crate) destination: String,
}

#[derive(Args)]
pub(crate) struct RestoreArgs {
    #[arg(help = "Original paths or trashed names; everything when empty")]
    pub(crate) items: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Devices => "devices",
        Command::Ls(_) => "ls",
        Command::Cat(_) => "cat",
        Command::Mkdir(_) => "mkdir",
        Command::Touch(_) => "touch",
        Command::Append(_) => "append",
        Command::Mv(_) => "mv",
        Command::Rename(_) => "rename",
        Command::Rm(_) => "rm",
        Command::Push(_) => "push",
        Command::Pull(_) => "pull",
        Command::Trash(_) => "trash",
        Command::Restore(_) => "restore",
        Command::TrashList => "trash-list",
        Command::EmptyTrash => "empty-trash",
    }
}
