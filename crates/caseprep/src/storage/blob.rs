//! Image blobs in one object store container.
//!
//! Image references stored on cases are public URLs of the form
//! `{container_url}/{blob_name}`; the blob name is always the last path
//! segment of the reference.

use std::path::Path as FsPath;
use std::sync::Arc;

use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutMode, PutOptions, PutPayload};
use percent_encoding::percent_decode_str;
use reqwest::Client;
use url::Url;

use super::container::{AzureContainerClient, ContainerProvisioner};
use super::ConnectionString;
use crate::error::StorageError;

/// Result of a skip-if-exists upload. Both variants carry the blob URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(String),
    AlreadyPresent(String),
}

impl UploadOutcome {
    pub fn url(&self) -> &str {
        match self {
            UploadOutcome::Uploaded(url) | UploadOutcome::AlreadyPresent(url) => url,
        }
    }

    pub fn into_url(self) -> String {
        match self {
            UploadOutcome::Uploaded(url) | UploadOutcome::AlreadyPresent(url) => url,
        }
    }
}

/// Blob adapter over any [`ObjectStore`]. Cheap to clone.
#[derive(Clone)]
pub struct BlobStore {
    store: Arc<dyn ObjectStore>,
    container_url: Url,
    provisioner: Option<Arc<dyn ContainerProvisioner>>,
}

impl BlobStore {
    /// `container_url` is the public URL the container's blobs are served
    /// under; it only shapes image references, it is never fetched.
    pub fn new(store: Arc<dyn ObjectStore>, container_url: Url) -> Self {
        Self {
            store,
            container_url,
            provisioner: None,
        }
    }

    /// Attaches the client that [`BlobStore::ensure_container`] uses.
    pub fn with_provisioner(mut self, provisioner: Arc<dyn ContainerProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Builds an Azure Blob Storage adapter from a storage account
    /// connection string. `http` is used to create the container.
    pub fn from_connection_string(
        raw: &str,
        container: &str,
        http: Client,
    ) -> Result<Self, StorageError> {
        let cs = ConnectionString::parse(raw)?;

        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(&cs.account_name)
            .with_access_key(&cs.account_key)
            .with_container_name(container);
        if cs.has_custom_endpoint() {
            builder = builder
                .with_endpoint(cs.blob_service_url())
                .with_allow_http(cs.allows_http());
        }

        let store = builder.build().map_err(|e| StorageError::ObjectStore {
            name: container.to_string(),
            source: e,
        })?;

        let container_url = Url::parse(&format!("{}/{}", cs.blob_service_url(), container))
            .map_err(|e| StorageError::InvalidConnectionString(format!("bad blob endpoint: {e}")))?;

        let provisioner = AzureContainerClient::new(http, &cs, container)?;

        log::info!("Blob store ready for container '{}'", container);

        Ok(Self::new(Arc::new(store), container_url).with_provisioner(Arc::new(provisioner)))
    }

    /// Creates the container when it is missing. Stores without a
    /// provisioner (in-memory, tests) need no container and succeed.
    pub async fn ensure_container(&self) -> Result<(), StorageError> {
        match &self.provisioner {
            Some(provisioner) => {
                provisioner.create_if_not_exists().await?;
            }
            None => log::debug!("No container provisioner configured, skipping"),
        }
        Ok(())
    }

    pub fn container_url(&self) -> &Url {
        &self.container_url
    }

    /// Public URL for a blob name. The name is percent-encoded as one path
    /// segment.
    pub fn url_for(&self, name: &str) -> Result<String, StorageError> {
        validate_name(name)?;
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidBlobName(name.to_string()))?
            .pop_if_empty()
            .push(name);
        Ok(url.to_string())
    }

    /// Recovers the blob name from an image reference.
    pub fn blob_name_from_ref(image_ref: &str) -> Result<String, StorageError> {
        let without_query = image_ref
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let segment = without_query
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::InvalidImageRef(image_ref.to_string()))?;

        let name = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| StorageError::InvalidImageRef(image_ref.to_string()))?;
        Ok(name.into_owned())
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = object_path(name)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::ObjectStore {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    /// Writes `bytes` under `name` unless a blob with that name already
    /// exists, in which case nothing is written. The existence check and the
    /// write are one conditional request.
    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<UploadOutcome, StorageError> {
        let url = self.url_for(name)?;
        self.put_if_absent(name, bytes, url).await
    }

    /// Uploads a local file under its file name, reading it only when the
    /// blob is not already present.
    pub async fn upload_file(&self, path: &FsPath) -> Result<UploadOutcome, StorageError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidBlobName(path.display().to_string()))?;

        let url = self.url_for(name)?;
        // Skips reading files that are already uploaded; the write below
        // stays conditional.
        if self.exists(name).await? {
            log::info!("Blob '{}' already exists, skipping upload", name);
            return Ok(UploadOutcome::AlreadyPresent(url));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
        self.put_if_absent(name, bytes, url).await
    }

    /// Reads a whole blob. A missing blob is [`StorageError::BlobNotFound`].
    pub async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = object_path(name)?;
        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::BlobNotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => {
                return Err(StorageError::ObjectStore {
                    name: name.to_string(),
                    source: e,
                })
            }
        };

        let bytes = result.bytes().await.map_err(|e| StorageError::ObjectStore {
            name: name.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }

    async fn put_if_absent(
        &self,
        name: &str,
        bytes: Vec<u8>,
        url: String,
    ) -> Result<UploadOutcome, StorageError> {
        let path = object_path(name)?;
        let content_type = mime_guess::from_path(name)
            .first_or_octet_stream()
            .to_string();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.into());
        let options = PutOptions {
            mode: PutMode::Create,
            attributes,
            ..Default::default()
        };

        match self
            .store
            .put_opts(&path, PutPayload::from(bytes), options)
            .await
        {
            Ok(_) => {
                log::info!("Uploaded blob '{}'", name);
                Ok(UploadOutcome::Uploaded(url))
            }
            Err(object_store::Error::AlreadyExists { .. })
            | Err(object_store::Error::Precondition { .. }) => {
                log::info!("Blob '{}' already exists, skipping upload", name);
                Ok(UploadOutcome::AlreadyPresent(url))
            }
            Err(e) => Err(StorageError::ObjectStore {
                name: name.to_string(),
                source: e,
            }),
        }
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(StorageError::InvalidBlobName(name.to_string()));
    }
    Ok(())
}

fn object_path(name: &str) -> Result<Path, StorageError> {
    validate_name(name)?;
    Path::parse(name).map_err(|_| StorageError::InvalidBlobName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> (Arc<InMemory>, BlobStore) {
        let memory = Arc::new(InMemory::new());
        let blobs = BlobStore::new(
            memory.clone(),
            Url::parse("https://acct.blob.core.windows.net/images").unwrap(),
        );
        (memory, blobs)
    }

    #[test]
    fn test_url_for() {
        let (_, blobs) = store();
        assert_eq!(
            blobs.url_for("damp.jpg").unwrap(),
            "https://acct.blob.core.windows.net/images/damp.jpg"
        );
        assert_eq!(
            blobs.url_for("damp wall.jpg").unwrap(),
            "https://acct.blob.core.windows.net/images/damp%20wall.jpg"
        );
    }

    #[test]
    fn test_url_for_rejects_nested_names() {
        let (_, blobs) = store();
        assert!(blobs.url_for("a/b.jpg").is_err());
        assert!(blobs.url_for("").is_err());
    }

    #[test]
    fn test_blob_name_from_ref() {
        assert_eq!(
            BlobStore::blob_name_from_ref("https://acct.blob.core.windows.net/images/damp.jpg")
                .unwrap(),
            "damp.jpg"
        );
        assert_eq!(
            BlobStore::blob_name_from_ref(
                "https://acct.blob.core.windows.net/images/damp%20wall.jpg?sv=2024"
            )
            .unwrap(),
            "damp wall.jpg"
        );
        assert!(BlobStore::blob_name_from_ref("https://acct/images/").is_err());
    }

    #[test]
    fn test_name_round_trips_through_reference() {
        let (_, blobs) = store();
        let url = blobs.url_for("leak (1).png").unwrap();
        assert_eq!(BlobStore::blob_name_from_ref(&url).unwrap(), "leak (1).png");
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let (_, blobs) = store();
        assert!(!blobs.exists("a.jpg").await.unwrap());

        let outcome = blobs.upload("a.jpg", vec![1, 2, 3]).await.unwrap();
        assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
        assert!(blobs.exists("a.jpg").await.unwrap());
        assert_eq!(blobs.download("a.jpg").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_second_upload_is_skipped() {
        let (memory, blobs) = store();
        let first = blobs.upload("a.jpg", vec![1, 2, 3]).await.unwrap();
        let second = blobs.upload("a.jpg", vec![9, 9]).await.unwrap();

        assert_eq!(second, UploadOutcome::AlreadyPresent(first.url().to_string()));
        let stored = memory
            .get(&Path::from("a.jpg"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_write_once() {
        let (memory, blobs) = store();
        let (a, b) = tokio::join!(
            blobs.upload("race.jpg", vec![1]),
            blobs.upload("race.jpg", vec![2]),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let uploaded = outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::Uploaded(_)))
            .count();
        assert_eq!(uploaded, 1);

        let stored = memory
            .get(&Path::from("race.jpg"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        let winner: u8 = if matches!(outcomes[0], UploadOutcome::Uploaded(_)) { 1 } else { 2 };
        assert_eq!(stored.as_ref(), &[winner]);
    }

    #[tokio::test]
    async fn test_ensure_container_calls_provisioner() {
        struct Counting(AtomicUsize);

        #[async_trait::async_trait]
        impl ContainerProvisioner for Counting {
            async fn create_if_not_exists(&self) -> Result<bool, StorageError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        }

        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let (_, blobs) = store();
        blobs.ensure_container().await.unwrap();

        let blobs = blobs.with_provisioner(counting.clone());
        blobs.ensure_container().await.unwrap();
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_sets_content_type() {
        let (memory, blobs) = store();
        blobs.upload("a.png", vec![0]).await.unwrap();
        let result = memory.get(&Path::from("a.png")).await.unwrap();
        let content_type: Option<&str> = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.as_ref());
        assert_eq!(content_type, Some("image/png"));
    }

    #[tokio::test]
    async fn test_upload_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crack.jpg");
        std::fs::write(&path, b"jpeg-bytes").unwrap();

        let (_, blobs) = store();
        let outcome = blobs.upload_file(&path).await.unwrap();
        assert_eq!(outcome.url(), "https://acct.blob.core.windows.net/images/crack.jpg");
        assert_eq!(blobs.download("crack.jpg").await.unwrap(), b"jpeg-bytes");

        let again = blobs.upload_file(&path).await.unwrap();
        assert!(matches!(again, UploadOutcome::AlreadyPresent(_)));
    }

    #[tokio::test]
    async fn test_download_missing_blob() {
        let (_, blobs) = store();
        let err = blobs.download("missing.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::BlobNotFound { name } if name == "missing.jpg"));
    }

    #[test]
    fn test_from_connection_string() {
        let blobs = BlobStore::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;EndpointSuffix=core.windows.net",
            "images",
            Client::new(),
        )
        .unwrap();
        assert_eq!(
            blobs.container_url().as_str(),
            "https://acct.blob.core.windows.net/images"
        );
    }

    #[test]
    fn test_from_bad_connection_string() {
        assert!(matches!(
            BlobStore::from_connection_string("nonsense", "images", Client::new()),
            Err(StorageError::InvalidConnectionString(_))
        ));
    }
}
