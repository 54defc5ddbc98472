use crate::error::{TrainingError, TrainingResult};
use crate::layout::{validate_segment, ProjectName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format appended to experiment names (minute resolution).
pub const EXPERIMENT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";

/// Identifier for one fine-tuning run: `<project>-exp-<YYYYMMDD-HHMM>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Name for an experiment started at `instant`.
    #[must_use]
    pub fn at(project: &ProjectName, instant: DateTime<Utc>) -> Self {
        Self(format!("{project}-exp-{}", instant.format(EXPERIMENT_TIMESTAMP_FORMAT)))
    }

    #[must_use]
    pub fn now(project: &ProjectName) -> Self {
        Self::at(project, Utc::now())
    }

    /// Accept an existing experiment name (e.g. from the command line).
    pub fn parse(name: impl Into<String>) -> TrainingResult<Self> {
        let name = name.into();
        validate_segment(&name)
            .map_err(|e| TrainingError::InvalidProject(format!("experiment {e}")))?;
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Iteration counts derived from dataset size and batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSchedule {
    pub iter_per_eval: u64,
    pub num_iterations: u64,
}

impl TrainingSchedule {
    /// Evaluate every five epochs; run `num_epochs` epochs in total.
    pub fn derive(number_training_files: u64, batch_size: u64, num_epochs: u64) -> TrainingResult<Self> {
        if batch_size == 0 {
            return Err(TrainingError::Render("batch_size must be >= 1".to_string()));
        }
        let steps_per_epoch = number_training_files / batch_size;
        let iter_per_eval = steps_per_epoch
            .checked_mul(5)
            .ok_or_else(|| TrainingError::Render("iter_per_eval overflows".to_string()))?;
        let num_iterations = steps_per_epoch
            .checked_mul(num_epochs)
            .ok_or_else(|| TrainingError::Render("num_iterations overflows".to_string()))?;
        Ok(Self { iter_per_eval, num_iterations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_schedule_from_dataset_size() {
        let schedule = TrainingSchedule::derive(100, 10, 5).unwrap();
        assert_eq!(schedule.iter_per_eval, 50);
        assert_eq!(schedule.num_iterations, 500);
    }

    #[test]
    fn test_schedule_floors_partial_batches() {
        let schedule = TrainingSchedule::derive(105, 10, 2).unwrap();
        assert_eq!(schedule.iter_per_eval, 50);
        assert_eq!(schedule.num_iterations, 20);
    }

    #[test]
    fn test_schedule_rejects_zero_batch() {
        assert!(TrainingSchedule::derive(100, 0, 5).is_err());
    }

    #[test]
    fn test_experiment_name_minute_resolution() {
        let project = ProjectName::new("floods").unwrap();
        let a = ExperimentName::at(&project, Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 1).unwrap());
        let b = ExperimentName::at(&project, Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 59).unwrap());
        let c = ExperimentName::at(&project, Utc.with_ymd_and_hms(2024, 3, 9, 14, 6, 0).unwrap());

        assert_eq!(a.as_str(), "floods-exp-20240309-1405");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_rejects_paths() {
        assert!(ExperimentName::parse("../etc").is_err());
        assert!(ExperimentName::parse("floods-exp-20240309-1405").is_ok());
    }
}
