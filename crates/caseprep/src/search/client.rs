//! Azure AI Search REST client.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::error::SearchError;
use super::schema::IndexDefinition;
use crate::case::EnrichedDocument;
use crate::http::truncate_body;

/// Service limit on documents per indexing request.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Destination for enriched documents.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Drops any existing index with the definition's name and creates it
    /// afresh.
    async fn recreate_index(&self, definition: &IndexDefinition) -> Result<(), SearchError>;

    /// Upserts every document. An empty slice makes no request.
    async fn upload_documents(
        &self,
        docs: &[EnrichedDocument],
    ) -> Result<PublishReport, SearchError>;
}

/// Per-document outcome of a publish.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub succeeded: usize,
    pub failed: Vec<DocumentFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub key: String,
    pub status_code: u16,
    pub message: Option<String>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    fn merge(&mut self, other: PublishReport) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }
}

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct IndexBatch<'a> {
    value: Vec<IndexAction<'a>>,
}

#[derive(Serialize)]
struct IndexAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    #[serde(flatten)]
    document: &'a EnrichedDocument,
}

#[derive(Deserialize)]
struct IndexResponse {
    value: Vec<IndexingResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(default)]
    error_message: Option<String>,
    status_code: u16,
}

// ─── Client ─────────────────────────────────────────────────────────────────

pub struct AzureSearchClient {
    client: Client,
    endpoint: Url,
    index_name: String,
    api_version: String,
    api_key: SecretString,
}

impl AzureSearchClient {
    /// `endpoint` must end with `/` so relative paths resolve beneath it.
    pub fn new(
        client: Client,
        endpoint: Url,
        index_name: impl Into<String>,
        api_version: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self {
            client,
            endpoint,
            index_name: index_name.into(),
            api_version: api_version.into(),
            api_key,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn url(&self, path: &str) -> Result<Url, SearchError> {
        let mut url = self.endpoint.join(path)?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("api-key", self.api_key.expose_secret())
    }

    /// Deletes the configured index. Returns `false` when it did not exist.
    pub async fn delete_index(&self) -> Result<bool, SearchError> {
        let url = self.url(&format!("indexes/{}", self.index_name))?;
        let response = self.request(Method::DELETE, url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(status_error(status, response.text().await?)),
        }
    }

    pub async fn create_index(&self, definition: &IndexDefinition) -> Result<(), SearchError> {
        let url = self.url(&format!("indexes/{}", definition.name))?;
        let response = self
            .request(Method::PUT, url)
            .json(definition)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.text().await?));
        }
        Ok(())
    }

    async fn send_batch(&self, docs: &[EnrichedDocument]) -> Result<PublishReport, SearchError> {
        let url = self.url(&format!("indexes/{}/docs/index", self.index_name))?;
        let batch = IndexBatch {
            value: docs
                .iter()
                .map(|document| IndexAction {
                    action: "upload",
                    document,
                })
                .collect(),
        };

        let response = self
            .request(Method::POST, url)
            .json(&batch)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // 207 means some documents failed; the body says which.
        if status != StatusCode::OK && status != StatusCode::MULTI_STATUS {
            return Err(status_error(status, body));
        }

        parse_index_response(&body)
    }

    /// Sends one service-sized chunk, halving it whenever the service
    /// rejects the payload as too large.
    async fn send_chunk(&self, docs: &[EnrichedDocument]) -> Result<PublishReport, SearchError> {
        let mut report = PublishReport::default();
        let mut pending = vec![docs];

        while let Some(batch) = pending.pop() {
            match self.send_batch(batch).await {
                Ok(partial) => report.merge(partial),
                Err(SearchError::Status { status: 413, .. }) if batch.len() > 1 => {
                    let (head, tail) = batch.split_at(batch.len() / 2);
                    debug!(size = batch.len(), "Batch too large, splitting");
                    pending.push(tail);
                    pending.push(head);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl SearchIndex for AzureSearchClient {
    async fn recreate_index(&self, definition: &IndexDefinition) -> Result<(), SearchError> {
        if self.delete_index().await? {
            info!(index = %self.index_name, "Deleted existing search index");
        }
        self.create_index(definition).await?;
        info!(index = %definition.name, "Created search index");
        Ok(())
    }

    async fn upload_documents(
        &self,
        docs: &[EnrichedDocument],
    ) -> Result<PublishReport, SearchError> {
        let mut report = PublishReport::default();
        if docs.is_empty() {
            return Ok(report);
        }

        for chunk in docs.chunks(MAX_BATCH_SIZE) {
            report.merge(self.send_chunk(chunk).await?);
        }

        for failure in &report.failed {
            warn!(
                case_id = %failure.key,
                status = failure.status_code,
                error = failure.message.as_deref().unwrap_or(""),
                "Document rejected by search index"
            );
        }
        info!(
            index = %self.index_name,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "Published documents"
        );

        Ok(report)
    }
}

fn status_error(status: StatusCode, body: String) -> SearchError {
    SearchError::Status {
        status: status.as_u16(),
        body: truncate_body(&body),
    }
}

fn parse_index_response(body: &str) -> Result<PublishReport, SearchError> {
    let response: IndexResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::MalformedResponse(format!("unexpected body shape: {}", e)))?;

    let mut report = PublishReport::default();
    for result in response.value {
        if result.status {
            report.succeeded += 1;
        } else {
            report.failed.push(DocumentFailure {
                key: result.key,
                status_code: result.status_code,
                message: result.error_message,
            });
        }
    }
    Ok(report)
}
