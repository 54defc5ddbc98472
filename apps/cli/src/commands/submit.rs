//! Submit command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use geotune_training::{
    submit, ClusterContext, JobKind, JobRequest, ProcessRunner, TorchxCommand, WorkflowConfig,
};
use serde_json::json;

use super::types::JobOptions;
use super::{resolve_target, SubmitCommand};

pub async fn execute(config: &WorkflowConfig, command: SubmitCommand) -> Result<()> {
    let (kind, target, options, checkpoint, bands) = match command {
        SubmitCommand::Train { target, options } => (JobKind::Train, target, options, None, None),
        SubmitCommand::Test { target, options, checkpoint } => (JobKind::Test, target, options, checkpoint, None),
        SubmitCommand::Infer { target, options, checkpoint, bands } => {
            (JobKind::Infer, target, options, checkpoint, bands)
        }
    };

    let (layout, experiment) = resolve_target(config, &target)?;
    let namespace = resolve_namespace(config, &options)?;

    let mut request = JobRequest::new(kind, layout, experiment, namespace, &config.jobs);
    if let Some(image) = options.image {
        request.image = image;
    }
    if let Some(gpus) = options.gpus {
        request.num_gpus = gpus;
    }
    if let Some(memory_mb) = options.memory_mb {
        request.memory_mb = memory_mb;
    }
    if let Some(checkpoint) = checkpoint {
        request.checkpoint = checkpoint;
    }
    if let Some(bands) = bands {
        request.bands = bands;
    }
    request.validate().context("Invalid job request")?;

    let command = TorchxCommand::for_request(&request);

    if options.dry_run {
        if options.json {
            let out = json!({
                "kind": kind,
                "program": command.program(),
                "args": command.args(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("{}", command.preview());
        }
        return Ok(());
    }

    if !options.json {
        println!("{}", "─".repeat(46));
        println!("Running:");
        println!("{}", command.preview().dimmed());
        println!("{}", "─".repeat(46));
    }

    let handle = submit(&ProcessRunner, &request)
        .await
        .with_context(|| format!("Failed to submit {kind} job for {}", request.experiment))?;

    if options.json {
        let out = json!({
            "kind": kind,
            "experiment": request.experiment,
            "job_id": handle,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("{kind} job submitted").bold().green());
    println!("  Job: {}", handle.0.cyan());
    println!();
    Ok(())
}

/// `--namespace`, then configuration, then the notebook environment.
fn resolve_namespace(config: &WorkflowConfig, options: &JobOptions) -> Result<String> {
    if let Some(ref namespace) = options.namespace {
        return Ok(namespace.clone());
    }
    if let Some(ref namespace) = config.jobs.namespace {
        return Ok(namespace.clone());
    }
    let ctx = ClusterContext::from_env(config.shared_root.clone())
        .context("No namespace given. Pass --namespace or run inside a notebook session")?;
    Ok(ctx.namespace)
}
