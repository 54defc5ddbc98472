//! Init command implementation.
//!
//! Creates the project directory tree on the shared volume.

use anyhow::{Context, Result};
use colored::Colorize;
use geotune_training::WorkflowConfig;
use serde_json::json;

use super::project_layout;

/// Execute the init command.
pub fn execute(config: &WorkflowConfig, project: &str, json_output: bool) -> Result<()> {
    let layout = project_layout(config, project)?;
    let report = layout
        .ensure_project_dirs()
        .with_context(|| format!("Failed to create project folders under {}", layout.shared_root().display()))?;

    if json_output {
        let out = json!({
            "project": layout.project(),
            "project_dir": layout.project_dir(),
            "created": report.created,
            "existing": report.existing,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "geotune init".bold().cyan());
    println!();
    for path in &report.created {
        println!("  {} {}", "✓ Created".green(), path.display());
    }
    for path in &report.existing {
        println!("  {} {}", "• Exists ".dimmed(), path.display().to_string().dimmed());
    }
    println!();
    if report.created.is_empty() {
        println!("{}", "Project already initialized.".yellow());
    } else {
        println!("{}", "Project initialized successfully!".green().bold());
    }
    println!("  Location: {}", layout.project_dir().display().to_string().dimmed());
    Ok(())
}
