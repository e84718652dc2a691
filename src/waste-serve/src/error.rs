use std::path::PathBuf;

use thiserror::Error;

/// Failures of model loading and of the prediction pipeline.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The model artifact is missing, corrupt or not understood by the runtime.
    #[error("failed to load model from {}: {}", .path.display(), .reason)]
    ModelLoad { path: PathBuf, reason: String },

    #[error("no inference backend compiled in, rebuild with the `tensorflow` feature")]
    NoBackend,

    /// The upload could not be decoded as an image.
    #[error("Error preprocessing image: {0}")]
    Preprocess(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model produced an empty output")]
    EmptyOutput,
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
