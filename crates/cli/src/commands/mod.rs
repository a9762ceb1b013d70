//! CLI command definitions and execution
//!
//! Every command runs against one [`Context`]: a connected [`S3Helper`] and
//! the cancellation token tripped by Ctrl+C.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use s3h_core::{
    Config, ConfigManager, HelperConfig, ObjectStore, ParsedPath, RemotePath, S3Helper,
    TransferOptions, parse_path,
};
use s3h_s3::S3Client;
use tokio_util::sync::CancellationToken;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

mod cat;
pub mod completions;
pub mod cp;
mod ls;
mod mb;
mod mv;
mod rb;
mod rm;
mod share;
mod stat;

/// s3h - folder-aware S3 helper
///
/// Lists, transfers and renames files and folders on AWS S3 and
/// S3-compatible stores. Remote paths are written as s3://bucket[/key].
#[derive(Parser, Debug)]
#[command(name = "s3h")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "S3H_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum concurrent transfers in a batch
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List buckets, or the folders and files under a prefix
    Ls(ls::LsArgs),

    /// Print an object's contents
    Cat(cat::CatArgs),

    /// Show object metadata or check that a folder exists
    Stat(stat::StatArgs),

    /// Copy files and folders between the local disk and S3
    Cp(cp::CpArgs),

    /// Rename a file, folder or bucket
    Mv(mv::MvArgs),

    /// Remove a file or folder
    Rm(rm::RmArgs),

    /// Create a bucket
    Mb(mb::MbArgs),

    /// Remove an empty bucket
    Rb(rb::RbArgs),

    /// Generate a presigned download URL
    Share(share::ShareArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

impl Commands {
    /// Commands that may run batches let in-flight items finish on the first Ctrl+C
    fn drains_on_interrupt(&self) -> bool {
        matches!(
            self,
            Commands::Cp(_) | Commands::Mv(_) | Commands::Rm(_) | Commands::Rb(_)
        )
    }
}

/// Shared state for one command invocation
#[derive(Clone)]
pub struct Context {
    pub helper: S3Helper,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(helper: S3Helper) -> Self {
        Self {
            helper,
            cancel: CancellationToken::new(),
        }
    }

    /// Connect to the store described by `config`
    pub async fn connect(config: &Config, concurrency: Option<usize>) -> anyhow::Result<Self> {
        let client = S3Client::new(&config.credentials)
            .await
            .context("Failed to create S3 client")?;
        let store: Arc<dyn ObjectStore> = Arc::new(client);

        let mut helper_config = HelperConfig::from(config);
        if let Some(concurrency) = concurrency {
            helper_config.concurrency = concurrency.max(1);
        }

        Ok(Self::new(S3Helper::new(store, helper_config)))
    }

    /// Batch options wired to this context's cancellation and a progress bar
    pub fn batch_options(&self, progress: &Arc<ProgressBar>) -> TransferOptions {
        self.helper
            .transfer_options()
            .with_cancel(self.cancel.clone())
            .with_observer(progress.clone())
    }
}

/// Load, overlay and validate the configuration
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path.to_path_buf()),
        None => ConfigManager::new().context("Failed to locate config directory")?,
    };

    let mut config = manager
        .load()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;
    config.apply_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Map an error chain to an exit code, preferring the innermost core error
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<s3h_core::Error>())
        .map(ExitCode::from_error)
        .unwrap_or(ExitCode::GeneralError)
}

/// Parse a path that must be remote
pub(crate) fn parse_remote(path: &str) -> Result<RemotePath, String> {
    match parse_path(path) {
        Ok(ParsedPath::Remote(remote)) => Ok(remote),
        Ok(ParsedPath::Local(_)) => Err(format!(
            "'{path}' is not a remote path. Use format: s3://bucket[/key]"
        )),
        Err(e) => Err(e.to_string()),
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let mut output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    let command = match cli.command {
        Commands::Completions(args) => return completions::execute(args),
        command => command,
    };

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            Formatter::new(output_config).error(&format!("{e:#}"));
            return exit_code_for(&e);
        }
    };

    output_config.json |= config.defaults.output.eq_ignore_ascii_case("json");
    output_config.no_progress |= !config.defaults.progress;
    let formatter = Formatter::new(output_config);

    let ctx = match Context::connect(&config, cli.concurrency).await {
        Ok(ctx) => ctx,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::NetworkError;
        }
    };

    let abort = CancellationToken::new();
    watch_interrupts(
        ctx.cancel.clone(),
        abort.clone(),
        command.drains_on_interrupt(),
        formatter.clone(),
    );

    tokio::select! {
        code = run(command, &ctx, &formatter) => code,
        () = abort.cancelled() => {
            formatter.error("Interrupted");
            ExitCode::Interrupted
        }
    }
}

/// Trip `cancel` on Ctrl+C, and `abort` once the command should stop at once
///
/// A draining command gets a second Ctrl+C before it is aborted.
fn watch_interrupts(
    cancel: CancellationToken,
    abort: CancellationToken,
    drains: bool,
    formatter: Formatter,
) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::debug!("interrupt received, cancelling");
        cancel.cancel();

        if drains {
            formatter.warning("Interrupted: finishing in-flight items, press Ctrl+C again to abort");
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
        }
        abort.cancel();
    });
}

/// Dispatch a parsed command against an existing context
///
/// A command that fails after the context was cancelled reports
/// [`ExitCode::Interrupted`].
pub async fn run(command: Commands, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let code = match command {
        Commands::Ls(args) => ls::execute(args, ctx, formatter).await,
        Commands::Cat(args) => cat::execute(args, ctx, formatter).await,
        Commands::Stat(args) => stat::execute(args, ctx, formatter).await,
        Commands::Cp(args) => cp::execute(args, ctx, formatter).await,
        Commands::Mv(args) => mv::execute(args, ctx, formatter).await,
        Commands::Rm(args) => rm::execute(args, ctx, formatter).await,
        Commands::Mb(args) => mb::execute(args, ctx, formatter).await,
        Commands::Rb(args) => rb::execute(args, ctx, formatter).await,
        Commands::Share(args) => share::execute(args, ctx, formatter).await,
        Commands::Completions(args) => completions::execute(args),
    };

    if code != ExitCode::Success && ctx.cancel.is_cancelled() {
        ExitCode::Interrupted
    } else {
        code
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "s3h",
            "--json",
            "--concurrency",
            "4",
            "ls",
            "s3://bucket/prefix/",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.concurrency, Some(4));
        assert!(matches!(cli.command, Commands::Ls(_)));
    }

    #[test]
    fn test_exit_code_for_wrapped_core_error() {
        let err = anyhow::Error::new(s3h_core::Error::Config("bad endpoint".into()))
            .context("Invalid configuration");
        assert_eq!(exit_code_for(&err), ExitCode::UsageError);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), ExitCode::GeneralError);
    }

    #[test]
    fn test_load_config_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("config.toml"))).unwrap();
        assert_eq!(config.defaults.concurrency, 8);
    }

    #[test]
    fn test_load_config_rejects_zero_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "schema_version = 1\n[defaults]\nconcurrency = 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::UsageError);
    }

    #[test]
    fn test_parse_remote_rejects_local() {
        assert!(parse_remote("./local/file").is_err());
        let remote = parse_remote("s3://bucket/a/b.txt").unwrap();
        assert_eq!(remote.bucket, "bucket");
        assert_eq!(remote.key, "a/b.txt");
    }

    #[tokio::test]
    async fn test_cancelled_batch_exits_interrupted() {
        let memory = Arc::new(s3h_core::MemoryStore::new().with_bucket("b1"));
        let ctx = test_support::context(&memory);
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), b"a").unwrap();
        std::fs::write(src.path().join("b.txt"), b"b").unwrap();

        ctx.cancel.cancel();
        let command = Commands::Cp(cp::CpArgs {
            source: src.path().to_str().unwrap().into(),
            target: "s3://b1/data/".into(),
            recursive: true,
            exclude: Vec::new(),
        });
        let code = run(command, &ctx, &test_support::quiet()).await;

        assert_eq!(code, ExitCode::Interrupted);
        assert!(memory.keys("b1").is_empty());
    }

    #[tokio::test]
    async fn test_uncancelled_failure_keeps_its_code() {
        let memory = Arc::new(s3h_core::MemoryStore::new().with_bucket("b1"));
        let ctx = test_support::context(&memory);
        let command = Commands::Rb(rb::RbArgs {
            target: "s3://missing-bucket".into(),
            force: false,
        });
        assert_eq!(
            run(command, &ctx, &test_support::quiet()).await,
            ExitCode::NotFound
        );
    }

    #[test]
    fn test_batch_commands_drain_on_interrupt() {
        let cli = Cli::try_parse_from(["s3h", "cp", "-r", "./dir", "s3://b1/"]).unwrap();
        assert!(cli.command.drains_on_interrupt());
        let cli = Cli::try_parse_from(["s3h", "cat", "s3://b1/a.txt"]).unwrap();
        assert!(!cli.command.drains_on_interrupt());
    }
}
