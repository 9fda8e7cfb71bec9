use std::fmt;

use thiserror::Error;

use crate::ai::VisionError;
use crate::error::StorageError;

/// Where a case is in its enrichment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Fetching,
    Describing,
    Classifying,
    Persisting,
    Embedding,
    Assembled,
    /// The worker task died before reporting a stage.
    Unknown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Describing => "describing",
            Stage::Classifying => "classifying",
            Stage::Persisting => "persisting",
            Stage::Embedding => "embedding",
            Stage::Assembled => "assembled",
            Stage::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a single case. They never abort the batch.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Failed to fetch image: {0}")]
    Fetch(#[source] StorageError),

    #[error("Failed to describe image: {0}")]
    Describe(#[source] VisionError),

    #[error("Worker task aborted: {0}")]
    Aborted(String),
}

/// Problems that degrade a case without failing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentWarning {
    NotPersisted { error: String },
    NoVector { error: String },
}
