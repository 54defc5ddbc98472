//! Metrics command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color as ComfyColor, ContentArrangement, Table};
use geotune_training::{load_test_metrics, load_tune_metrics, MetricsTable, WorkflowConfig};
use serde_json::Value;

use super::{resolve_target, MetricsCommand};

pub fn execute(config: &WorkflowConfig, command: MetricsCommand) -> Result<()> {
    match command {
        MetricsCommand::Tune { target, json } => {
            let (layout, experiment) = resolve_target(config, &target)?;
            let metrics = load_tune_metrics(&layout, &experiment)
                .with_context(|| format!("Failed to load training metrics for {experiment}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
                return Ok(());
            }

            println!();
            println!("{}", format!("Training metrics ({})", metrics.train.len()).bold().cyan());
            println!("{}", render_table(&metrics.train));
            println!();
            println!("{}", format!("Validation metrics ({})", metrics.val.len()).bold().cyan());
            println!("{}", render_table(&metrics.val));
            println!();
            println!("  Log: {}", metrics.log_path.display().to_string().dimmed());
            Ok(())
        }
        MetricsCommand::Test { target, json } => {
            let (layout, experiment) = resolve_target(config, &target)?;
            let metrics = load_test_metrics(&layout, &experiment)
                .with_context(|| format!("Failed to load test metrics for {experiment}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
                return Ok(());
            }

            println!();
            println!("{}", "Test metrics".bold().cyan());
            match metrics.as_object() {
                Some(object) => {
                    let mut table = Table::new();
                    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
                    table.set_header(vec![Cell::new("Metric").fg(ComfyColor::Cyan), Cell::new("Value")]);
                    for (key, value) in object {
                        table.add_row(vec![Cell::new(key), Cell::new(cell_text(value))]);
                    }
                    println!("{table}");
                }
                None => println!("{}", serde_json::to_string_pretty(&metrics)?),
            }
            Ok(())
        }
    }
}

fn render_table(metrics: &MetricsTable) -> String {
    if metrics.is_empty() {
        return format!("  {}", "No records.".dimmed());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(metrics.columns.iter().map(|c| Cell::new(c).fg(ComfyColor::Cyan)));
    for row in &metrics.rows {
        table.add_row(metrics.columns.iter().map(|c| Cell::new(row.get(c).map(cell_text).unwrap_or_default())));
    }
    table.to_string()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
