//! Context command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use geotune_training::{ClusterContext, WorkflowConfig};

/// Execute the context command.
pub fn execute(config: &WorkflowConfig, json_output: bool) -> Result<()> {
    let ctx = ClusterContext::from_env(config.shared_root.clone())
        .context("Failed to read cluster context. Is this running inside a notebook session?")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
        return Ok(());
    }

    println!();
    println!("{}", "Cluster Context".bold().cyan());
    println!();
    println!("  Login URL:   {}", ctx.login_url.cyan());
    println!("  Namespace:   {}", ctx.namespace.cyan());
    println!("  Shared root: {}", ctx.shared_root.display().to_string().dimmed());
    println!();
    Ok(())
}
