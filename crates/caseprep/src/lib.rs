pub mod ai;
pub mod app;
pub mod case;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod search;
pub mod secrets;
pub mod seed;
pub mod storage;
pub mod worker;

pub use ai::{AzureEmbeddingClient, AzureVisionClient, EmbeddingModel, VisionModel};
pub use app::{RunOptions, RunSummary, Services};
pub use case::{EnrichedDocument, JobAssigned, MaintenanceCase};
pub use config::{LogFormat, Settings};
pub use db::{CaseRepository, DatabaseError};
pub use error::{BatchError, CaseprepError, ConfigError, Result, SeedError, StorageError};
pub use pipeline::{CaseEnricher, CaseOutcome, Stage};
pub use search::{AzureSearchClient, PublishReport, SearchIndex};
pub use secrets::{resolve_secret, SecretError};
pub use storage::BlobStore;
pub use worker::{BatchCoordinator, BatchReport, PublishUnpersisted};
