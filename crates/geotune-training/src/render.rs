//! Rendering a per-experiment training config from a template.

use crate::error::{TrainingError, TrainingResult};
use crate::experiment::{ExperimentName, TrainingSchedule};
use crate::layout::ProjectLayout;
use crate::template::{SubstitutionMode, Template};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flat parameter mapping substituted into the template.
pub type ConfigParams = BTreeMap<String, Value>;

pub const NUMBER_TRAINING_FILES: &str = "number_training_files";
pub const BATCH_SIZE: &str = "batch_size";
pub const NUM_EPOCHS: &str = "num_epochs";
pub const EXP_NAME: &str = "exp_name";
pub const ITER_PER_EVAL: &str = "iter_per_eval";
pub const NUM_ITERATIONS: &str = "num_iterations";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedConfig {
    pub experiment_name: ExperimentName,
    pub path: PathBuf,
    pub schedule: TrainingSchedule,
    /// Parameters as substituted, including the computed fields.
    pub params: ConfigParams,
}

/// Read a parameter file. `.toml` files are parsed as TOML, everything else
/// as a JSON object.
pub fn load_params(path: &Path) -> TrainingResult<ConfigParams> {
    let content = std::fs::read_to_string(path)?;
    let is_toml = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(&content)
            .map_err(|e| TrainingError::Render(format!("failed to parse {}: {e}", path.display())))
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

/// Compute the derived fields, substitute every parameter into the template
/// and write `configs/<exp>_config.py`. An existing file is overwritten.
pub fn render_config(
    layout: &ProjectLayout,
    params: &ConfigParams,
    template_path: &Path,
    mode: SubstitutionMode,
    instant: DateTime<Utc>,
) -> TrainingResult<RenderedConfig> {
    let schedule = TrainingSchedule::derive(
        integer_param(params, NUMBER_TRAINING_FILES)?,
        integer_param(params, BATCH_SIZE)?,
        integer_param(params, NUM_EPOCHS)?,
    )?;
    let experiment_name = ExperimentName::at(layout.project(), instant);

    let mut params = params.clone();
    params.insert(EXP_NAME.to_string(), Value::String(experiment_name.to_string()));
    params.insert(ITER_PER_EVAL.to_string(), Value::String(schedule.iter_per_eval.to_string()));
    params.insert(NUM_ITERATIONS.to_string(), Value::String(schedule.num_iterations.to_string()));
    debug!(?params, "config parameters");

    let template = Template::from_file(template_path)?;
    let values: BTreeMap<String, String> = params.iter().map(|(k, v)| (k.clone(), value_text(v))).collect();
    let rendered = template.substitute(&values, mode)?;

    let configs_dir = layout.configs_dir();
    if !configs_dir.is_dir() {
        return Err(TrainingError::Render(format!(
            "configs directory {} does not exist (initialize the project first)",
            configs_dir.display()
        )));
    }

    let path = layout.config_path(&experiment_name);
    std::fs::write(&path, rendered)?;
    info!(experiment = %experiment_name, path = %path.display(), "rendered training config");

    Ok(RenderedConfig { experiment_name, path, schedule, params })
}

/// Read back a rendered config for display.
pub fn view_config(path: &Path) -> TrainingResult<String> {
    Ok(std::fs::read_to_string(path)?)
}

fn integer_param(params: &ConfigParams, name: &str) -> TrainingResult<u64> {
    let value = params
        .get(name)
        .ok_or_else(|| TrainingError::Render(format!("missing required parameter `{name}`")))?;

    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_number)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(whole_number))
        }
        _ => None,
    };
    parsed.ok_or_else(|| {
        TrainingError::Render(format!("parameter `{name}` must be a non-negative integer, got {value}"))
    })
}

/// `100.0` counts as `100`; fractional, negative or out-of-range values do not.
fn whole_number(value: f64) -> Option<u64> {
    let in_range = value.is_finite() && value >= 0.0 && value < 18_446_744_073_709_551_616.0;
    (in_range && value.fract() == 0.0).then(|| value as u64)
}

/// Text form of a parameter inside a Python config file.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}
