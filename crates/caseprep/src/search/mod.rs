//! Azure AI Search: index provisioning and document publishing.

pub mod client;
pub mod error;
pub mod schema;

pub use client::{AzureSearchClient, DocumentFailure, PublishReport, SearchIndex};
pub use error::SearchError;
pub use schema::{IndexDefinition, VectorizerSource};
