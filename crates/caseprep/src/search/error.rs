use thiserror::Error;

/// Errors from the search service. All of them are fatal to a run.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Search service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Search service response is malformed: {0}")]
    MalformedResponse(String),

    #[error("Invalid search service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
