//! Command type definitions shared between main.rs and the command modules.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Bucket to download from
    #[arg(long)]
    pub bucket: String,

    /// Key prefix to match
    #[arg(long)]
    pub prefix: String,

    /// Local destination directory
    #[arg(long, conflicts_with = "project")]
    pub dest: Option<PathBuf>,

    /// Download into this project's training-data directory
    #[arg(long)]
    pub project: Option<String>,

    /// Number of merged/mask pairs to sample (all files when omitted)
    #[arg(long)]
    pub sample: Option<usize>,

    /// Sampling seed (overrides configuration)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Object storage endpoint (overrides configuration)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Output report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Render a training config for a new experiment
    Render {
        /// Project name
        project: String,

        /// Template file with $placeholders
        #[arg(long)]
        template: PathBuf,

        /// Parameter file (.json or .toml)
        #[arg(long)]
        params: PathBuf,

        /// Leave unknown placeholders untouched instead of failing
        #[arg(long)]
        permissive: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a rendered config file
    Show {
        /// Path to the config file
        path: PathBuf,
    },
}

/// Project and experiment a job runs against.
#[derive(Args, Debug, Clone)]
pub struct JobTarget {
    /// Project name
    pub project: String,

    /// Experiment name (e.g. <project>-exp-20240501-1230)
    pub experiment: String,
}

/// Options shared by every job kind.
#[derive(Args, Debug, Clone)]
pub struct JobOptions {
    /// Kubernetes namespace (defaults to the one in NOTEBOOK_ARGS)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Container image
    #[arg(long)]
    pub image: Option<String>,

    /// Number of GPUs
    #[arg(long)]
    pub gpus: Option<u32>,

    /// Memory request in MB
    #[arg(long)]
    pub memory_mb: Option<u32>,

    /// Print the command without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubmitCommand {
    /// Submit a fine-tuning job
    Train {
        #[command(flatten)]
        target: JobTarget,

        #[command(flatten)]
        options: JobOptions,
    },

    /// Submit an evaluation job for a checkpoint
    Test {
        #[command(flatten)]
        target: JobTarget,

        #[command(flatten)]
        options: JobOptions,

        /// Checkpoint file in the experiment directory
        #[arg(long)]
        checkpoint: Option<String>,
    },

    /// Submit a batch inference job
    Infer {
        #[command(flatten)]
        target: JobTarget,

        #[command(flatten)]
        options: JobOptions,

        /// Checkpoint file in the experiment directory
        #[arg(long)]
        checkpoint: Option<String>,

        /// Band selection, e.g. "[2,1,0,3]"
        #[arg(long)]
        bands: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum MetricsCommand {
    /// Show training and validation metrics from the training log
    Tune {
        #[command(flatten)]
        target: JobTarget,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the latest evaluation result
    Test {
        #[command(flatten)]
        target: JobTarget,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
