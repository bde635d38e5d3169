use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No model loaded")]
    ModelNotLoaded,

    #[error("Artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("Artifact already exists: {}", .0.display())]
    ArtifactExists(PathBuf),

    #[error("Another training run holds the lock on {}", .0.display())]
    TrainingInProgress(PathBuf),

    #[error("Unknown model type: {0}")]
    UnknownModelType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, PhishError>;
