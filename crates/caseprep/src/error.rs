use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::search::SearchError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum CaseprepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Seeding error: {0}")]
    Seed(#[from] SeedError),

    #[error("Batch failed: {0}")]
    Batch(#[from] BatchError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings from environment: {0}")]
    Env(#[from] envconfig::Error),

    #[error("Secret '{name}' could not be resolved: {source}")]
    Secret {
        name: &'static str,
        #[source]
        source: SecretError,
    },

    #[error("Setting '{name}' is not a valid URL ('{value}'): {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Settings validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob '{name}' not found")]
    BlobNotFound { name: String },

    #[error("Object store operation on '{name}' failed: {source}")]
    ObjectStore {
        name: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Invalid blob name '{0}'")]
    InvalidBlobName(String),

    #[error("Cannot derive a blob name from image reference '{0}'")]
    InvalidImageRef(String),

    #[error("Invalid storage connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Container request for '{container}' failed: {source}")]
    ContainerRequest {
        container: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Creating container '{container}' returned HTTP {status}: {body}")]
    ContainerStatus {
        container: String,
        status: u16,
        body: String,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Failed to scan data folder '{path}': {source}")]
    ScanDataFolder {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Data folder '{0}' does not exist")]
    MissingDataFolder(PathBuf),
}

/// Errors that abort a whole run. Per-case failures never surface here.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to ensure the blob container exists: {0}")]
    EnsureContainer(#[source] StorageError),

    #[error("None of the {found} images in the data folder could be seeded")]
    NothingSeeded { found: usize },

    #[error("Failed to reset the case table: {0}")]
    ResetTable(#[source] DatabaseError),

    #[error("Failed to list pending cases: {0}")]
    ListCases(#[source] DatabaseError),

    #[error("Failed to provision search index: {0}")]
    ProvisionIndex(#[source] SearchError),

    #[error("Failed to serialize output documents: {0}")]
    SerializeOutput(#[from] serde_json::Error),

    #[error("Failed to write output file '{path}': {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to publish documents to the search index: {0}")]
    Publish(#[source] SearchError),
}

pub type Result<T> = std::result::Result<T, CaseprepError>;
