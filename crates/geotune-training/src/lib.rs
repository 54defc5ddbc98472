//! Geotune Training
//!
//! Helpers for fine-tuning geospatial foundation models on a shared cluster:
//! - Reading cluster context from the notebook environment (`ClusterContext`)
//! - Scaffolding project directories on the shared volume (`ProjectLayout`)
//! - Downloading training data from S3-compatible storage (`download_prefix`)
//! - Rendering per-experiment training configs (`render_config`)
//! - Submitting train/test/inference jobs through `torchx` (`submit`)
//! - Loading the metrics those jobs write (`load_tune_metrics`, `load_test_metrics`)

pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod experiment;
pub mod job;
pub mod layout;
pub mod metrics;
pub mod progress;
pub mod render;
pub mod storage;
pub mod template;

pub use config::{ConfigFile, JobDefaults, StorageConfig, StorageCredentials, WorkflowConfig};
pub use context::ClusterContext;
pub use download::{download_prefix, list_all, mask_key_for, select_keys, DownloadReport, DownloadRequest, KeySelection, Listing};
pub use error::{TrainingError, TrainingResult};
pub use experiment::{ExperimentName, TrainingSchedule};
pub use job::{parse_job_id, submit, CommandOutput, CommandRunner, JobHandle, JobKind, JobRequest, ProcessRunner, TorchxCommand};
pub use layout::{ProjectLayout, ProjectName, ScaffoldReport, PROJECT_SUBDIRS};
pub use metrics::{load_test_metrics, load_tune_metrics, parse_train_log, MetricsTable, TuneMetrics};
pub use progress::{NullProgressSink, ProgressEvent, ProgressSink, StdoutProgressSink};
pub use render::{load_params, render_config, view_config, ConfigParams, RenderedConfig};
pub use storage::{ListPage, ObjectStore, S3ObjectStore};
pub use template::{SubstitutionMode, Template};
