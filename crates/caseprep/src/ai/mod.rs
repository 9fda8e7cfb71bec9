//! Azure OpenAI model clients: image descriptions and text embeddings.
//!
//! Both services sit behind small traits so the enrichment pipeline can be
//! driven by stubs in tests.

use async_trait::async_trait;
use secrecy::SecretString;
use url::Url;

pub mod embedding;
pub mod error;
pub mod prompt;
pub mod vision;

pub use embedding::AzureEmbeddingClient;
pub use error::{EmbeddingError, VisionError};
pub use vision::AzureVisionClient;

/// Produces a free-form description of an image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe(&self, image: &[u8]) -> Result<String, VisionError>;
}

/// Produces a fixed-length embedding for a piece of text.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Where an Azure OpenAI deployment lives and how to authenticate to it.
pub struct Deployment {
    pub base_url: Url,
    pub name: String,
    pub api_version: String,
    pub api_key: SecretString,
}

impl Deployment {
    /// Builds `{base}openai/deployments/{name}/{operation}?api-version=...`.
    pub fn operation_url(&self, operation: &str) -> Result<Url, url::ParseError> {
        let mut url = self
            .base_url
            .join(&format!("openai/deployments/{}/{}", self.name, operation))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }
}
