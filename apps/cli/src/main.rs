//! Geotune CLI - Command-line interface for geospatial fine-tuning workflows
//!
//! This CLI provides a `geotune` command for scaffolding projects, fetching
//! training data, rendering configs and submitting jobs to the cluster.

mod commands;
mod config;
mod progress;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, shells};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{context, download, init, metrics, render, submit};
use commands::{ConfigCommand, DownloadArgs, MetricsCommand, SubmitCommand};

/// Geotune CLI - Fine-tune geospatial foundation models on a shared cluster
///
/// Geotune drives the full fine-tuning loop from an interactive session:
/// project scaffolding, data download, config rendering, job submission and
/// metrics inspection.
#[derive(Parser, Debug)]
#[command(
    name = "geotune",
    author,
    version,
    about = "Geotune - geospatial foundation-model fine-tuning helper",
    long_about = "Geotune scaffolds projects on the shared volume, downloads training data from S3-compatible storage,\nrenders training configs and submits torchx jobs to the Kubernetes scheduler."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (overrides ~/.geotune/config.toml and ./.geotunerc)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Shared volume root (overrides GEOTUNE_SHARED_ROOT)
    #[arg(long, global = true)]
    shared_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show cluster login URL and namespace
    ///
    /// Reads the notebook server settings from NOTEBOOK_ARGS.
    Context {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the project directory tree on the shared volume
    ///
    /// Creates configs, fine-tune-checkpoints, gfm-models, inference and
    /// training-data. Safe to re-run on an existing project.
    Init {
        /// Project name
        project: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download training data from object storage
    Download(DownloadArgs),

    /// Render and inspect training configs
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Submit train, test or inference jobs
    #[command(subcommand)]
    Submit(SubmitCommand),

    /// Load metrics written by training and test jobs
    #[command(subcommand)]
    Metrics(MetricsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Handle completion generation
    if let Ok(shell) = std::env::var("GEOTUNE_GENERATE_COMPLETIONS") {
        let mut cmd = Args::command();
        match shell.as_str() {
            "bash" => generate(shells::Bash, &mut cmd, "geotune", &mut std::io::stdout()),
            "zsh" => generate(shells::Zsh, &mut cmd, "geotune", &mut std::io::stdout()),
            "fish" => generate(shells::Fish, &mut cmd, "geotune", &mut std::io::stdout()),
            "powershell" => generate(shells::PowerShell, &mut cmd, "geotune", &mut std::io::stdout()),
            "elvish" => generate(shells::Elvish, &mut cmd, "geotune", &mut std::io::stdout()),
            _ => {
                eprintln!("Unknown shell: {}. Supported: bash, zsh, fish, powershell, elvish", shell);
                std::process::exit(1);
            }
        };
        return Ok(());
    }

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so `--json` output stays parseable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let workflow = config::load_config(args.config.as_deref(), args.shared_root)?;

    match command {
        Command::Context { json } => {
            context::execute(&workflow, json)?;
        }
        Command::Init { project, json } => {
            init::execute(&workflow, &project, json)?;
        }
        Command::Download(download_args) => {
            download::execute(workflow, download_args).await?;
        }
        Command::Config(cmd) => {
            render::execute(&workflow, cmd)?;
        }
        Command::Submit(cmd) => {
            submit::execute(&workflow, cmd).await?;
        }
        Command::Metrics(cmd) => {
            metrics::execute(&workflow, cmd)?;
        }
    }

    Ok(())
}
