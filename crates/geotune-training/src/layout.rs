use crate::error::{TrainingError, TrainingResult};
use crate::experiment::ExperimentName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Fixed subdirectories created under every project.
pub const PROJECT_SUBDIRS: [&str; 5] =
    ["configs", "fine-tune-checkpoints", "gfm-models", "inference", "training-data"];

/// Where the shared volume is mounted inside submitted jobs.
pub const CONTAINER_DATA_ROOT: &str = "/data";

/// A project identifier. Must be a single, non-empty path segment so it can
/// be joined onto the shared root and passed to the job CLI as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(name: impl Into<String>) -> TrainingResult<Self> {
        let name = name.into();
        validate_segment(&name).map_err(TrainingError::InvalidProject)?;
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reject anything that is not a plain path segment.
pub(crate) fn validate_segment(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("`{name}` is not a valid name"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(format!("`{name}` must not contain path separators"));
    }
    if name.starts_with('-') {
        return Err(format!("`{name}` must not start with '-'"));
    }
    Ok(())
}

/// Filesystem layout for one project on the shared volume.
///
/// Default layout is `<shared_root>/<project>/{configs,fine-tune-checkpoints,...}`.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    shared_root: PathBuf,
    project: ProjectName,
}

/// Outcome of [`ProjectLayout::ensure_project_dirs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldReport {
    pub created: Vec<PathBuf>,
    pub existing: Vec<PathBuf>,
}

impl ProjectLayout {
    #[must_use]
    pub fn new(shared_root: impl Into<PathBuf>, project: ProjectName) -> Self {
        Self { shared_root: shared_root.into(), project }
    }

    #[must_use]
    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    #[must_use]
    pub fn shared_root(&self) -> &Path {
        &self.shared_root
    }

    #[must_use]
    pub fn project_dir(&self) -> PathBuf {
        self.shared_root.join(self.project.as_str())
    }

    #[must_use]
    pub fn configs_dir(&self) -> PathBuf {
        self.project_dir().join("configs")
    }

    #[must_use]
    pub fn checkpoints_dir(&self) -> PathBuf {
        self.project_dir().join("fine-tune-checkpoints")
    }

    #[must_use]
    pub fn training_data_dir(&self) -> PathBuf {
        self.project_dir().join("training-data")
    }

    #[must_use]
    pub fn inference_dir(&self) -> PathBuf {
        self.project_dir().join("inference")
    }

    #[must_use]
    pub fn experiment_dir(&self, experiment: &ExperimentName) -> PathBuf {
        self.checkpoints_dir().join(experiment.as_str())
    }

    /// Rendered config for an experiment: `configs/<exp>_config.py`.
    #[must_use]
    pub fn config_path(&self, experiment: &ExperimentName) -> PathBuf {
        self.configs_dir().join(config_file_name(experiment))
    }

    /// Container-side project directory, e.g. `/data/<project>`.
    #[must_use]
    pub fn container_project_dir(&self) -> String {
        format!("{CONTAINER_DATA_ROOT}/{}", self.project)
    }

    /// Container-side path of the rendered config used for training.
    #[must_use]
    pub fn container_config_path(&self, experiment: &ExperimentName) -> String {
        format!("{}/configs/{}", self.container_project_dir(), config_file_name(experiment))
    }

    /// Container-side checkpoint directory of an experiment.
    #[must_use]
    pub fn container_experiment_dir(&self, experiment: &ExperimentName) -> String {
        format!("{}/fine-tune-checkpoints/{experiment}", self.container_project_dir())
    }

    /// Create the project directory and its fixed subdirectories.
    ///
    /// Directories that already exist are reported, not treated as failures,
    /// so re-running on an existing project succeeds.
    pub fn ensure_project_dirs(&self) -> TrainingResult<ScaffoldReport> {
        let mut report = ScaffoldReport::default();

        let project_dir = self.project_dir();
        ensure_dir(&project_dir, &mut report)?;
        for sub in PROJECT_SUBDIRS {
            ensure_dir(&project_dir.join(sub), &mut report)?;
        }

        Ok(report)
    }
}

fn config_file_name(experiment: &ExperimentName) -> String {
    format!("{experiment}_config.py")
}

fn ensure_dir(path: &Path, report: &mut ScaffoldReport) -> TrainingResult<()> {
    match std::fs::create_dir(path) {
        Ok(()) => {
            info!(path = %path.display(), "created directory");
            report.created.push(path.to_path_buf());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            if !path.is_dir() {
                return Err(TrainingError::Scaffold(format!(
                    "{} exists and is not a directory",
                    path.display()
                )));
            }
            report.existing.push(path.to_path_buf());
            Ok(())
        }
        Err(e) => Err(TrainingError::Scaffold(format!("failed to create {}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(root: &Path) -> ProjectLayout {
        ProjectLayout::new(root, ProjectName::new("burn-scars").unwrap())
    }

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = layout(temp.path());
        let exp = ExperimentName::parse("burn-scars-exp-20240101-1200").unwrap();

        assert_eq!(layout.project_dir(), temp.path().join("burn-scars"));
        assert_eq!(
            layout.config_path(&exp),
            temp.path().join("burn-scars/configs/burn-scars-exp-20240101-1200_config.py")
        );
        assert_eq!(
            layout.container_config_path(&exp),
            "/data/burn-scars/configs/burn-scars-exp-20240101-1200_config.py"
        );
        assert_eq!(
            layout.container_experiment_dir(&exp),
            "/data/burn-scars/fine-tune-checkpoints/burn-scars-exp-20240101-1200"
        );
    }

    #[test]
    fn test_ensure_project_dirs_creates_tree() {
        let temp = TempDir::new().unwrap();
        let report = layout(temp.path()).ensure_project_dirs().unwrap();

        assert_eq!(report.created.len(), 6);
        assert!(report.existing.is_empty());
        for sub in PROJECT_SUBDIRS {
            assert!(temp.path().join("burn-scars").join(sub).is_dir());
        }
    }

    #[test]
    fn test_ensure_project_dirs_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let layout = layout(temp.path());
        layout.ensure_project_dirs().unwrap();

        let report = layout.ensure_project_dirs().unwrap();
        assert!(report.created.is_empty());
        assert_eq!(report.existing.len(), 6);
    }

    #[test]
    fn test_ensure_project_dirs_completes_partial_tree() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("burn-scars/configs")).unwrap();

        let report = layout(temp.path()).ensure_project_dirs().unwrap();
        assert_eq!(report.existing.len(), 2);
        assert_eq!(report.created.len(), 4);
    }

    #[test]
    fn test_file_in_the_way_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("burn-scars")).unwrap();
        std::fs::write(temp.path().join("burn-scars/configs"), "oops").unwrap();

        let result = layout(temp.path()).ensure_project_dirs();
        assert!(matches!(result, Err(TrainingError::Scaffold(_))));
    }

    #[test]
    fn test_missing_shared_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = layout(&temp.path().join("absent")).ensure_project_dirs();
        assert!(result.is_err());
    }

    #[test]
    fn test_project_name_validation() {
        assert!(ProjectName::new("").is_err());
        assert!(ProjectName::new("..").is_err());
        assert!(ProjectName::new("a/b").is_err());
        assert!(ProjectName::new("--flag").is_err());
        assert!(ProjectName::new("flood mapping").is_ok());
    }
}
