//! Loading the JSON logs and evaluation results written by training jobs.

use crate::error::{TrainingError, TrainingResult};
use crate::experiment::ExperimentName;
use crate::layout::ProjectLayout;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TRAIN_LOG_PATTERN: &str = "*.log.json";
pub const EVAL_RESULT_PATTERN: &str = "eval_single_scale*.json";

/// Records sharing a union of columns, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsTable {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl MetricsTable {
    /// Columns are collected in first-seen order across all records.
    #[must_use]
    pub fn from_records(rows: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `row`, if present.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuneMetrics {
    pub log_path: PathBuf,
    pub train: MetricsTable,
    pub val: MetricsTable,
}

fn find_matches(dir: &Path, pattern: &str) -> TrainingResult<Vec<PathBuf>> {
    let query = format!("{}/{pattern}", glob::Pattern::escape(&dir.to_string_lossy()));
    debug!(query = %query, "searching for metrics files");

    // Hidden files (editor swaps, partial writes) never match.
    let options = glob::MatchOptions { require_literal_leading_dot: true, ..glob::MatchOptions::new() };
    let entries = glob::glob_with(&query, options)
        .map_err(|e| TrainingError::Metrics(format!("bad pattern {query}: {e}")))?;
    let mut paths = entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TrainingError::Metrics(e.to_string()))?;
    paths.sort();
    Ok(paths)
}

/// Parse a training log: the first line is run metadata and is skipped; every
/// other non-empty line is one JSON record tagged with `mode`.
pub fn parse_train_log(contents: &str) -> TrainingResult<(MetricsTable, MetricsTable)> {
    let mut train = Vec::new();
    let mut val = Vec::new();

    for (idx, line) in contents.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Map<String, Value> = serde_json::from_str(line).map_err(|e| {
            TrainingError::Metrics(format!("failed to parse log line {}: {e}", idx + 1))
        })?;

        let mode = record.get("mode").and_then(Value::as_str).ok_or_else(|| {
            TrainingError::Metrics(format!("log line {} has no `mode` field", idx + 1))
        })?;
        match mode {
            "train" => train.push(record),
            "val" => val.push(record),
            _ => {}
        }
    }

    Ok((MetricsTable::from_records(train), MetricsTable::from_records(val)))
}

/// Load the training log of an experiment and split it into train and
/// validation tables.
pub fn load_tune_metrics(layout: &ProjectLayout, experiment: &ExperimentName) -> TrainingResult<TuneMetrics> {
    let dir = layout.experiment_dir(experiment);
    let log_path = find_matches(&dir, TRAIN_LOG_PATTERN)?.into_iter().next().ok_or_else(|| {
        TrainingError::Metrics(format!("no {TRAIN_LOG_PATTERN} file found in {}", dir.display()))
    })?;

    let contents = std::fs::read_to_string(&log_path)?;
    let (train, val) = parse_train_log(&contents)?;
    debug!(path = %log_path.display(), train = train.len(), val = val.len(), "loaded training log");

    Ok(TuneMetrics { log_path, train, val })
}

/// Load the most recent evaluation result (lexicographically last file).
pub fn load_test_metrics(layout: &ProjectLayout, experiment: &ExperimentName) -> TrainingResult<Value> {
    let dir = layout.experiment_dir(experiment);
    let path = find_matches(&dir, EVAL_RESULT_PATTERN)?.pop().ok_or_else(|| {
        TrainingError::Metrics(format!("no {EVAL_RESULT_PATTERN} file found in {}", dir.display()))
    })?;

    let bytes = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ProjectName;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectLayout, ExperimentName, PathBuf) {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path(), ProjectName::new("floods").unwrap());
        let exp = ExperimentName::parse("floods-exp-20240501-1230").unwrap();
        let dir = layout.experiment_dir(&exp);
        std::fs::create_dir_all(&dir).unwrap();
        (temp, layout, exp, dir)
    }

    #[test]
    fn test_parse_train_log_skips_header() {
        let log = "{\"meta\":1}\n{\"mode\":\"train\",\"x\":1}\n{\"mode\":\"val\",\"x\":2}\n";
        let (train, val) = parse_train_log(log).unwrap();

        assert_eq!(train.len(), 1);
        assert_eq!(val.len(), 1);
        assert_eq!(train.cell(0, "x"), Some(&json!(1)));
        assert_eq!(val.cell(0, "x"), Some(&json!(2)));
    }

    #[test]
    fn test_parse_train_log_rejects_bad_json() {
        let err = parse_train_log("{}\n{\"mode\":\"train\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_parse_train_log_requires_mode() {
        assert!(parse_train_log("{}\n{\"loss\":0.1}\n").is_err());
    }

    #[test]
    fn test_columns_union_in_first_seen_order() {
        let log = concat!(
            "{}\n",
            "{\"mode\":\"train\",\"iter\":50,\"loss\":0.9}\n",
            "{\"mode\":\"train\",\"iter\":100,\"loss\":0.7,\"lr\":0.001}\n",
        );
        let (train, _) = parse_train_log(log).unwrap();
        assert_eq!(train.columns, ["mode", "iter", "loss", "lr"]);
        assert_eq!(train.cell(0, "lr"), None);
        assert_eq!(train.cell(1, "iter"), Some(&json!(100)));
    }

    #[test]
    fn test_columns_keep_record_key_order() {
        let (train, _) = parse_train_log("{}\n{\"mode\":\"train\",\"iter\":50,\"loss\":0.9,\"lr\":0.001}\n").unwrap();
        assert_eq!(train.columns, ["mode", "iter", "loss", "lr"]);

        let keys: Vec<&String> = train.rows[0].keys().collect();
        assert_eq!(keys, ["mode", "iter", "loss", "lr"]);
    }

    #[test]
    fn test_load_tune_metrics_from_experiment_dir() {
        let (_temp, layout, exp, dir) = setup();
        std::fs::write(
            dir.join("20240501_123100.log.json"),
            "{\"env_info\":\"...\"}\n{\"mode\":\"train\",\"loss\":1.0}\n{\"mode\":\"train\",\"loss\":0.5}\n{\"mode\":\"val\",\"mIoU\":0.4}\n",
        )
        .unwrap();

        let metrics = load_tune_metrics(&layout, &exp).unwrap();
        assert_eq!(metrics.train.len(), 2);
        assert_eq!(metrics.val.len(), 1);
        assert!(metrics.log_path.ends_with("20240501_123100.log.json"));
    }

    #[test]
    fn test_load_tune_metrics_ignores_hidden_logs() {
        let (_temp, layout, exp, dir) = setup();
        std::fs::write(dir.join(".tmp.log.json"), "{}\n{\"mode\":\"val\",\"mIoU\":0.9}\n").unwrap();
        assert!(matches!(load_tune_metrics(&layout, &exp), Err(TrainingError::Metrics(_))));

        std::fs::write(dir.join("20240501_123100.log.json"), "{}\n{\"mode\":\"train\",\"loss\":1.0}\n").unwrap();
        let metrics = load_tune_metrics(&layout, &exp).unwrap();
        assert!(metrics.log_path.ends_with("20240501_123100.log.json"));
        assert_eq!(metrics.train.len(), 1);
        assert!(metrics.val.is_empty());
    }

    #[test]
    fn test_load_test_metrics_ignores_hidden_results() {
        let (_temp, layout, exp, dir) = setup();
        std::fs::write(dir.join("eval_single_scale_20240501_120000.json"), r#"{"mIoU": 0.2}"#).unwrap();
        std::fs::write(dir.join(".eval_single_scale_99999999.json"), r#"{"mIoU": 0.9}"#).unwrap();

        let metrics = load_test_metrics(&layout, &exp).unwrap();
        assert_eq!(metrics["mIoU"], json!(0.2));
    }

    #[test]
    fn test_load_tune_metrics_missing_log() {
        let (_temp, layout, exp, _dir) = setup();
        assert!(matches!(load_tune_metrics(&layout, &exp), Err(TrainingError::Metrics(_))));
    }

    #[test]
    fn test_load_test_metrics_picks_last() {
        let (_temp, layout, exp, dir) = setup();
        std::fs::write(dir.join("eval_single_scale_20240501_120000.json"), r#"{"mIoU": 0.1}"#).unwrap();
        std::fs::write(dir.join("eval_single_scale_20240502_090000.json"), r#"{"mIoU": 0.6}"#).unwrap();
        std::fs::write(dir.join("other.json"), r#"{"mIoU": 0.9}"#).unwrap();

        let metrics = load_test_metrics(&layout, &exp).unwrap();
        assert_eq!(metrics["mIoU"], json!(0.6));
    }

    #[test]
    fn test_load_test_metrics_missing() {
        let (_temp, layout, exp, _dir) = setup();
        assert!(load_test_metrics(&layout, &exp).is_err());
    }
}
