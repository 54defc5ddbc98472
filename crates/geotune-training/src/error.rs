use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("cluster context error: {0}")]
    Context(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid project name: {0}")]
    InvalidProject(String),

    #[error("scaffold error: {0}")]
    Scaffold(String),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("sampling error: {0}")]
    Sampling(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("job submission failed: {0}")]
    Submit(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
