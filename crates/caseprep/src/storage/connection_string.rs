//! Azure Storage connection string parsing.
//!
//! Format: `Key=Value` pairs separated by `;`. Keys are case-insensitive and
//! values may themselves contain `=` (account keys are base64).

use crate::error::StorageError;

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: String,
    pub protocol: String,
    pub endpoint_suffix: String,
    /// Explicit blob endpoint, e.g. for emulators or private links.
    pub blob_endpoint: Option<String>,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"[REDACTED]")
            .field("protocol", &self.protocol)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = None;
        let mut endpoint_suffix = None;
        let mut blob_endpoint = None;

        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                StorageError::InvalidConnectionString(format!("segment without '=': {}", key_only(pair)))
            })?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "accountname" => account_name = Some(value),
                "accountkey" => account_key = Some(value),
                "defaultendpointsprotocol" => protocol = Some(value),
                "endpointsuffix" => endpoint_suffix = Some(value),
                "blobendpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                // Queue/table/file endpoints and SAS tokens are not used.
                _ => {}
            }
        }

        let account_name = account_name.filter(|v| !v.is_empty()).ok_or_else(|| {
            StorageError::InvalidConnectionString("AccountName is missing".to_string())
        })?;
        let account_key = account_key.filter(|v| !v.is_empty()).ok_or_else(|| {
            StorageError::InvalidConnectionString("AccountKey is missing".to_string())
        })?;

        Ok(Self {
            account_name,
            account_key,
            protocol: protocol.unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            endpoint_suffix: endpoint_suffix.unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            blob_endpoint,
        })
    }

    /// Base URL of the blob service, without a trailing slash.
    pub fn blob_service_url(&self) -> String {
        match &self.blob_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "{}://{}.blob.{}",
                self.protocol, self.account_name, self.endpoint_suffix
            ),
        }
    }

    /// True when the default public endpoint is not used.
    pub fn has_custom_endpoint(&self) -> bool {
        self.blob_endpoint.is_some() || self.endpoint_suffix != DEFAULT_ENDPOINT_SUFFIX
    }

    pub fn allows_http(&self) -> bool {
        self.blob_service_url().starts_with("http://")
    }
}

/// Keeps key names in error messages while never echoing secret values.
fn key_only(segment: &str) -> String {
    segment.chars().take(24).collect()
}
