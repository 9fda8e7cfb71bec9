//! Azure OpenAI embeddings.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::EmbeddingError;
use super::{Deployment, EmbeddingModel};
use crate::http::truncate_body;

/// Vector length produced by the default embedding deployment.
pub const DEFAULT_DIMENSIONS: usize = 1536;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct AzureEmbeddingClient {
    client: Client,
    url: Url,
    api_key: SecretString,
    model: String,
    dimensions: usize,
}

impl AzureEmbeddingClient {
    /// `dimensions` is the vector length every response must carry; it has
    /// to match the index schema.
    pub fn new(
        client: Client,
        deployment: Deployment,
        dimensions: usize,
    ) -> Result<Self, url::ParseError> {
        let url = deployment.operation_url("embeddings")?;
        Ok(Self {
            client,
            url,
            api_key: deployment.api_key,
            model: deployment.name,
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl EmbeddingModel for AzureEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!("Requesting embedding for {} chars of text", text.len());

        let response = self
            .client
            .post(self.url.clone())
            .header("api-key", self.api_key.expose_secret())
            .json(&EmbeddingRequest {
                input: text,
                model: &self.model,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        parse_embedding(&body, self.dimensions)
    }
}

/// Takes the first embedding from a response body and checks its length.
pub fn parse_embedding(body: &str, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    let response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        EmbeddingError::MalformedResponse(format!("unexpected body shape: {}", e))
    })?;

    let vector = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| EmbeddingError::MalformedResponse("response has no data".to_string()))?;

    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }

    Ok(vector)
}
