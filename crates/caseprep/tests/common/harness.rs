//! Isolated environment for driving the enrichment pipeline and full runs.
//!
//! Every harness owns a temporary SQLite database file, an in-memory object
//! store, a data folder and stub model clients. Nothing touches the network.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use secrecy::SecretString;
use tempfile::TempDir;
use url::Url;

use caseprep::ai::{EmbeddingError, EmbeddingModel, VisionError, VisionModel};
use caseprep::app::{RunOptions, Services};
use caseprep::case::{EnrichedDocument, MaintenanceCase};
use caseprep::db::{self, CaseRepository};
use caseprep::error::StorageError;
use caseprep::pipeline::CaseEnricher;
use caseprep::search::{IndexDefinition, PublishReport, SearchError, SearchIndex, VectorizerSource};
use caseprep::storage::{BlobStore, ContainerProvisioner};
use caseprep::worker::{BatchCoordinator, PublishUnpersisted};

use super::builders::CaseBuilder;

/// Blobs starting with these bytes make [`StubVision`] fail.
pub const BROKEN_IMAGE_PREFIX: &[u8] = b"broken";

const CONTAINER_URL: &str = "https://testacct.blob.core.windows.net/images";
const EMBED_DIMENSIONS: usize = 8;

/// Vision stub answering every image with the same text.
pub struct StubVision {
    text: String,
}

impl StubVision {
    pub fn answering(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl VisionModel for StubVision {
    async fn describe(&self, image: &[u8]) -> Result<String, VisionError> {
        if image.starts_with(BROKEN_IMAGE_PREFIX) {
            return Err(VisionError::Status {
                status: 500,
                body: "model unavailable".to_string(),
            });
        }
        Ok(self.text.clone())
    }
}

/// Embedding stub returning a constant vector, or always failing.
pub struct StubEmbedder {
    fail: bool,
}

impl StubEmbedder {
    pub fn working() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl EmbeddingModel for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.fail {
            return Err(EmbeddingError::Status {
                status: 429,
                body: "rate limited".to_string(),
            });
        }
        Ok(vec![0.5; EMBED_DIMENSIONS])
    }
}

/// Search index that records every call.
#[derive(Default)]
pub struct RecordingIndex {
    recreated: Mutex<Vec<String>>,
    uploads: Mutex<Vec<Vec<EnrichedDocument>>>,
}

impl RecordingIndex {
    pub fn recreated(&self) -> Vec<String> {
        self.recreated.lock().unwrap().clone()
    }

    /// Every document received, across all upload calls.
    pub fn documents(&self) -> Vec<EnrichedDocument> {
        self.uploads.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    async fn recreate_index(&self, definition: &IndexDefinition) -> Result<(), SearchError> {
        self.recreated
            .lock()
            .unwrap()
            .push(definition.name.clone());
        Ok(())
    }

    async fn upload_documents(
        &self,
        docs: &[EnrichedDocument],
    ) -> Result<PublishReport, SearchError> {
        if docs.is_empty() {
            return Ok(PublishReport::default());
        }
        self.uploads.lock().unwrap().push(docs.to_vec());
        Ok(PublishReport {
            succeeded: docs.len(),
            failed: Vec::new(),
        })
    }
}

/// Container provisioner that counts calls and can be told to fail.
#[derive(Default)]
pub struct RecordingProvisioner {
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingProvisioner {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerProvisioner for RecordingProvisioner {
    async fn create_if_not_exists(&self) -> Result<bool, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StorageError::ContainerStatus {
                container: "images".to_string(),
                status: 403,
                body: "AuthorizationFailure".to_string(),
            });
        }
        Ok(true)
    }
}

pub struct TestHarness {
    dir: TempDir,
    pub services: Services,
    pub index: Arc<RecordingIndex>,
}

impl TestHarness {
    pub async fn new(
        vision: impl VisionModel + 'static,
        embedder: impl EmbeddingModel + 'static,
    ) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir(dir.path().join("data")).expect("create data dir");

        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("cases.db").display()
        );
        let connection = db::connect(&url, 1, 4).await.expect("connect sqlite");
        let blobs = BlobStore::new(
            Arc::new(InMemory::new()),
            Url::parse(CONTAINER_URL).unwrap(),
        );
        let index = Arc::new(RecordingIndex::default());

        let services = Services {
            cases: CaseRepository::new(connection),
            blobs,
            vision: Arc::new(vision),
            embedder: Arc::new(embedder),
            search: index.clone(),
        };

        Self {
            dir,
            services,
            index,
        }
    }

    /// Swaps the blob backend, keeping the container URL.
    pub fn use_object_store(&mut self, store: Arc<dyn ObjectStore>) {
        self.services.blobs = BlobStore::new(store, Url::parse(CONTAINER_URL).unwrap());
    }

    /// Attaches a container provisioner to the blob store.
    pub fn use_provisioner(&mut self, provisioner: Arc<RecordingProvisioner>) {
        self.services.blobs = self.services.blobs.clone().with_provisioner(provisioner);
    }

    pub fn cases(&self) -> &CaseRepository {
        &self.services.cases
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.services.blobs
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join("out").join("indexdata.json")
    }

    /// Puts an image file into the seeding data folder.
    pub fn write_image(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.data_dir().join(name);
        std::fs::write(&path, bytes).expect("write image");
        path
    }

    /// Inserts a pending row and, when `image` is given, uploads its blob.
    pub async fn add_case(&self, builder: CaseBuilder, image: Option<Vec<u8>>) -> MaintenanceCase {
        let file_name = builder.file_name_ref().to_string();
        let url = self.blobs().url_for(&file_name).expect("blob url");
        let case = builder.build(url);
        if let Some(bytes) = image {
            self.blobs()
                .upload(&file_name, bytes)
                .await
                .expect("upload blob");
        }
        self.cases().insert(&case).await.expect("insert case");
        case
    }

    pub fn enricher(&self) -> CaseEnricher {
        CaseEnricher::new(
            self.services.blobs.clone(),
            self.services.cases.clone(),
            Arc::clone(&self.services.vision),
            Arc::clone(&self.services.embedder),
        )
    }

    pub fn coordinator(&self, max_concurrency: usize) -> BatchCoordinator {
        BatchCoordinator::new(self.services.cases.clone(), self.enricher(), max_concurrency)
    }

    pub fn run_options(&self, publish_policy: PublishUnpersisted) -> RunOptions {
        let vectorizer = VectorizerSource {
            resource_uri: "https://oai.example.com/".to_string(),
            deployment_id: "text-embedding-ada-002".to_string(),
            model_name: "text-embedding-ada-002".to_string(),
            api_key: SecretString::from("test-key"),
        };
        RunOptions {
            data_dir: self.data_dir(),
            output_path: self.output_path(),
            max_concurrency: 3,
            publish_policy,
            index: IndexDefinition::maintenance_requests(
                "maintenance-requests".to_string(),
                EMBED_DIMENSIONS,
                vectorizer,
            ),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
