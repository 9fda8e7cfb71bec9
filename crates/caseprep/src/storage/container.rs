//! Blob container provisioning.
//!
//! `object_store` only reads and writes blobs, so creating the container is a
//! direct call to the Blob service REST API, authorized with the account key
//! (SharedKey scheme).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use url::Url;

use super::ConnectionString;
use crate::error::StorageError;
use crate::http::truncate_body;

type HmacSha256 = Hmac<Sha256>;

/// Blob service REST version sent with every request.
const STORAGE_API_VERSION: &str = "2021-08-06";

/// Creates the blob container when it is missing.
#[async_trait]
pub trait ContainerProvisioner: Send + Sync {
    /// Returns `true` when the container was created, `false` when it was
    /// already there.
    async fn create_if_not_exists(&self) -> Result<bool, StorageError>;
}

/// SharedKey-authorized `Create Container` client.
pub struct AzureContainerClient {
    client: Client,
    container: String,
    container_url: Url,
    account_name: String,
    account_key: SecretString,
}

impl AzureContainerClient {
    pub fn new(
        client: Client,
        connection: &ConnectionString,
        container: &str,
    ) -> Result<Self, StorageError> {
        let container_url = Url::parse(&format!(
            "{}/{}",
            connection.blob_service_url(),
            container
        ))
        .map_err(|e| StorageError::InvalidConnectionString(format!("bad blob endpoint: {e}")))?;

        // Fail on a malformed key now rather than at the first request.
        STANDARD
            .decode(&connection.account_key)
            .map_err(|_| {
                StorageError::InvalidConnectionString("AccountKey is not valid base64".to_string())
            })?;

        Ok(Self {
            client,
            container: container.to_string(),
            container_url,
            account_name: connection.account_name.clone(),
            account_key: SecretString::from(connection.account_key.clone()),
        })
    }

    fn create_url(&self) -> Url {
        let mut url = self.container_url.clone();
        url.query_pairs_mut().append_pair("restype", "container");
        url
    }

    fn authorization(&self, url: &Url, ms_date: &str) -> Result<String, StorageError> {
        let key = STANDARD
            .decode(self.account_key.expose_secret())
            .map_err(|_| {
                StorageError::InvalidConnectionString("AccountKey is not valid base64".to_string())
            })?;
        let canonical = string_to_sign("PUT", &self.account_name, url, ms_date);

        let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| {
            StorageError::InvalidConnectionString("AccountKey is empty".to_string())
        })?;
        mac.update(canonical.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.account_name, signature))
    }
}

#[async_trait]
impl ContainerProvisioner for AzureContainerClient {
    async fn create_if_not_exists(&self) -> Result<bool, StorageError> {
        let url = self.create_url();
        let ms_date = http_date(Utc::now());
        let authorization = self.authorization(&url, &ms_date)?;

        let response = self
            .client
            .put(url)
            .header("x-ms-date", &ms_date)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("Authorization", authorization)
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| StorageError::ContainerRequest {
                container: self.container.clone(),
                source: e,
            })?;

        match response.status() {
            StatusCode::CREATED => {
                log::info!("Created blob container '{}'", self.container);
                Ok(true)
            }
            StatusCode::CONFLICT => {
                log::info!("Blob container '{}' already exists", self.container);
                Ok(false)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StorageError::ContainerStatus {
                    container: self.container.clone(),
                    status: status.as_u16(),
                    body: truncate_body(&body),
                })
            }
        }
    }
}

/// RFC 1123 date in GMT, as the `x-ms-date` header expects.
fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// SharedKey string-to-sign for a body-less request whose only signed
/// headers are `x-ms-date` and `x-ms-version`.
///
/// The twelve standard header lines are empty: Content-Length is blank for
/// zero-length bodies and the date travels in `x-ms-date`.
fn string_to_sign(method: &str, account: &str, url: &Url, ms_date: &str) -> String {
    let mut out = String::new();
    out.push_str(method);
    out.push('\n');
    out.push_str(&"\n".repeat(11));
    out.push_str(&format!("x-ms-date:{}\n", ms_date));
    out.push_str(&format!("x-ms-version:{}\n", STORAGE_API_VERSION));
    out.push_str(&format!("/{}{}", account, url.path()));

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();
    params.sort();
    for (name, value) in params {
        out.push_str(&format!("\n{}:{}", name, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection(endpoint: &str) -> ConnectionString {
        ConnectionString::parse(&format!(
            "AccountName=acct;AccountKey=a2V5LWJ5dGVz;BlobEndpoint={endpoint}"
        ))
        .unwrap()
    }

    async fn client_for(server: &MockServer) -> AzureContainerClient {
        AzureContainerClient::new(
            Client::new(),
            &connection(&format!("{}/acct", server.uri())),
            "images",
        )
        .unwrap()
    }

    #[test]
    fn test_http_date() {
        let date = Utc.with_ymd_and_hms(2024, 6, 3, 7, 5, 9).unwrap();
        assert_eq!(http_date(date), "Mon, 03 Jun 2024 07:05:09 GMT");
    }

    #[test]
    fn test_string_to_sign() {
        let url = Url::parse("http://127.0.0.1:10000/acct/images?restype=container").unwrap();
        let signed = string_to_sign("PUT", "acct", &url, "Mon, 03 Jun 2024 07:05:09 GMT");
        let expected = format!(
            "PUT\n{}x-ms-date:Mon, 03 Jun 2024 07:05:09 GMT\nx-ms-version:{}\n/acct/acct/images\nrestype:container",
            "\n".repeat(11),
            STORAGE_API_VERSION
        );
        assert_eq!(signed, expected);
    }

    #[test]
    fn test_rejects_non_base64_key() {
        let cs = ConnectionString::parse("AccountName=acct;AccountKey=not*base64").unwrap();
        assert!(matches!(
            AzureContainerClient::new(Client::new(), &cs, "images"),
            Err(StorageError::InvalidConnectionString(_))
        ));
    }

    #[tokio::test]
    async fn test_creates_missing_container() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/acct/images"))
            .and(query_param("restype", "container"))
            .and(header("x-ms-version", STORAGE_API_VERSION))
            .and(header_exists("x-ms-date"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.create_if_not_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_container_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_string("ContainerAlreadyExists"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(!client.create_if_not_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_authorization_uses_shared_key() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.create_if_not_exists().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let auth = requests[0]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(auth.starts_with("SharedKey acct:"));
        assert!(auth.len() > "SharedKey acct:".len());
    }

    #[tokio::test]
    async fn test_forbidden_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AuthenticationFailed"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.create_if_not_exists().await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::ContainerStatus { status: 403, ref body, .. } if body == "AuthenticationFailed"
        ));
    }
}
