//! Config command implementation.

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use geotune_training::{load_params, render_config, view_config, SubstitutionMode, WorkflowConfig};
use serde_json::json;

use super::{project_layout, ConfigCommand};

pub fn execute(config: &WorkflowConfig, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Render { project, template, params, permissive, json } => {
            let layout = project_layout(config, &project)?;
            let params = load_params(&params)
                .with_context(|| format!("Failed to read parameters from {}", params.display()))?;
            let mode = if permissive { SubstitutionMode::Permissive } else { SubstitutionMode::Strict };

            let rendered = render_config(&layout, &params, &template, mode, Utc::now())
                .context("Failed to render training config")?;

            if json {
                let out = json!({
                    "experiment_name": rendered.experiment_name,
                    "path": rendered.path,
                    "iter_per_eval": rendered.schedule.iter_per_eval,
                    "num_iterations": rendered.schedule.num_iterations,
                    "params": rendered.params,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!();
            println!("{}", "Config rendered".bold().green());
            println!("  Experiment:     {}", rendered.experiment_name.as_str().cyan());
            println!("  Path:           {}", rendered.path.display().to_string().dimmed());
            println!("  iter_per_eval:  {}", rendered.schedule.iter_per_eval);
            println!("  num_iterations: {}", rendered.schedule.num_iterations);
            println!();
            println!(
                "  {}",
                format!("Next: geotune submit train {project} {}", rendered.experiment_name).dimmed()
            );
            println!();
            Ok(())
        }
        ConfigCommand::Show { path } => {
            let text = view_config(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}
