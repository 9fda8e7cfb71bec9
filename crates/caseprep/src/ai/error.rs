use thiserror::Error;

/// Errors from the vision (description) service.
#[derive(Error, Debug)]
pub enum VisionError {
    /// Connect, timeout or body read failure.
    #[error("Vision service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Vision service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered 2xx but not with a usable completion.
    #[error("Vision service response is malformed: {0}")]
    MalformedResponse(String),
}

impl VisionError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, VisionError::MalformedResponse(_))
    }
}

/// Errors from the embedding service.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Embedding service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Embedding service response is malformed: {0}")]
    MalformedResponse(String),

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
