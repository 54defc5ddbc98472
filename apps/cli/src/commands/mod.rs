//! Command implementations for the Geotune CLI.

pub mod context;
pub mod download;
pub mod init;
pub mod metrics;
pub mod render;
pub mod submit;
pub mod types;

pub use types::{ConfigCommand, DownloadArgs, JobTarget, MetricsCommand, SubmitCommand};

use anyhow::{Context, Result};
use geotune_training::{ExperimentName, ProjectLayout, ProjectName, WorkflowConfig};

/// Layout for `project` under the configured shared root.
pub fn project_layout(config: &WorkflowConfig, project: &str) -> Result<ProjectLayout> {
    let project = ProjectName::new(project).context("Invalid project name")?;
    Ok(ProjectLayout::new(config.shared_root.clone(), project))
}

/// Layout and experiment name for a job target.
pub fn resolve_target(config: &WorkflowConfig, target: &JobTarget) -> Result<(ProjectLayout, ExperimentName)> {
    let layout = project_layout(config, &target.project)?;
    let experiment = ExperimentName::parse(target.experiment.clone()).context("Invalid experiment name")?;
    Ok((layout, experiment))
}
