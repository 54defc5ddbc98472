//! Download command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use geotune_training::{
    download_prefix, DownloadRequest, NullProgressSink, ProgressSink, S3ObjectStore, StdoutProgressSink,
    WorkflowConfig,
};
use std::io::IsTerminal;

use super::{project_layout, DownloadArgs};
use crate::progress::BarProgressSink;

/// Execute the download command.
pub async fn execute(config: WorkflowConfig, args: DownloadArgs) -> Result<()> {
    let local_root = match (&args.dest, &args.project) {
        (Some(dest), _) => dest.clone(),
        (None, Some(project)) => project_layout(&config, project)?.training_data_dir(),
        (None, None) => anyhow::bail!("Either --dest or --project is required"),
    };

    let mut config = config
        .with_env_credentials()
        .context("Object storage credentials are missing from the environment")?;
    if let Some(endpoint) = args.endpoint {
        config.storage.endpoint = endpoint;
    }

    let store = S3ObjectStore::new(&config.storage).context("Failed to create object storage client")?;
    let request = DownloadRequest {
        bucket: args.bucket,
        prefix: args.prefix,
        local_root,
        sample: args.sample,
        seed: args.seed.unwrap_or(config.sample_seed),
    };

    // Line-based progress when output is captured (notebook cells, logs).
    let progress: Box<dyn ProgressSink> = if args.json {
        Box::new(NullProgressSink)
    } else if std::io::stdout().is_terminal() {
        Box::new(BarProgressSink::new())
    } else {
        Box::new(StdoutProgressSink)
    };
    let report = download_prefix(&store, &request, progress.as_ref())
        .await
        .with_context(|| format!("Failed to download s3://{}/{}", request.bucket, request.prefix))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("{}", "Download complete".bold().green());
    println!("  Objects:     {}", report.downloaded.len().to_string().cyan());
    println!("  Directories: {}", report.directories_created.len().to_string().cyan());
    println!("  Destination: {}", request.local_root.display().to_string().dimmed());
    if !report.unpaired.is_empty() {
        println!();
        println!("  {}", format!("{} sampled files have no mask:", report.unpaired.len()).yellow());
        for key in &report.unpaired {
            println!("    {}", key.dimmed());
        }
    }
    println!();
    Ok(())
}
