use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use envconfig::Envconfig;
use secrecy::SecretString;
use url::Url;

use crate::error::ConfigError;
use crate::secrets::resolve_secret;
use crate::worker::PublishUnpersisted;

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Run settings, read from the environment.
///
/// Not `Debug`: the struct carries API keys.
#[derive(Envconfig, Clone)]
pub struct Settings {
    #[envconfig(from = "AZURE_OAI_ENDPOINT")]
    pub oai_endpoint: String,

    #[envconfig(from = "AZURE_OAI_API_KEY")]
    pub oai_api_key: Option<String>,

    #[envconfig(from = "AZURE_OAI_API_KEY_FILE")]
    pub oai_api_key_file: Option<String>,

    #[envconfig(from = "AZURE_OAI_EMBED_DEPLOYMENT_NAME", default = "text-embedding-ada-002")]
    pub embed_deployment: String,

    #[envconfig(from = "AZURE_OAI_EMBED_API_VERSION", default = "2024-02-01")]
    pub embed_api_version: String,

    #[envconfig(from = "AZURE_OAI_EMBED_DIMENSIONS", default = "1536")]
    pub embed_dimensions: usize,

    #[envconfig(from = "AZURE_OAI_GPTVISION_DEPLOYMENT_NAME", default = "gpt-4-turbo")]
    pub vision_deployment: String,

    #[envconfig(from = "AZURE_OAI_GPTVISION_API_VERSION", default = "2024-02-15-preview")]
    pub vision_api_version: String,

    #[envconfig(from = "AZURE_SEARCH_SERVICE_ENDPOINT")]
    pub search_endpoint: String,

    #[envconfig(from = "AZURE_SEARCH_API_KEY")]
    pub search_api_key: Option<String>,

    #[envconfig(from = "AZURE_SEARCH_API_KEY_FILE")]
    pub search_api_key_file: Option<String>,

    #[envconfig(from = "AZURE_SEARCH_INDEX_NAME", default = "maintenance-requests")]
    pub search_index_name: String,

    #[envconfig(from = "AZURE_SEARCH_API_VERSION", default = "2024-07-01")]
    pub search_api_version: String,

    #[envconfig(from = "AZURE_BLOB_CONNECTION_STRING")]
    pub blob_connection_string: String,

    #[envconfig(from = "AZURE_STORAGE_CONTAINER", default = "images")]
    pub storage_container: String,

    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "DATABASE_MIN_CONNECTIONS", default = "1")]
    pub db_min_connections: u32,

    // Also the default bound on in-flight enrichment workers.
    #[envconfig(from = "DATABASE_MAX_CONNECTIONS", default = "10")]
    pub db_max_connections: u32,

    #[envconfig(from = "PREP_DATA_DIR", default = "data")]
    pub data_dir: PathBuf,

    #[envconfig(from = "PREP_OUTPUT_PATH", default = "scripts/indexdata.json")]
    pub output_path: PathBuf,

    #[envconfig(from = "PREP_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    #[envconfig(from = "PREP_HTTP_TIMEOUT_SECS", default = "120")]
    pub http_timeout_secs: u64,

    #[envconfig(from = "PREP_PUBLISH_UNPERSISTED", default = "true")]
    pub publish_unpersisted: bool,

    #[envconfig(from = "PREP_LOG_FORMAT", default = "text")]
    pub log_format: String,
}

impl Settings {
    /// Reads and validates settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self::init_from_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads and validates settings from an explicit map (tests, embedding).
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let settings = Self::init_from_hashmap(vars)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.oai_base_url()?;
        self.search_base_url()?;

        if self.db_min_connections == 0 {
            return Err(validation("DATABASE_MIN_CONNECTIONS must be at least 1"));
        }
        if self.db_max_connections < self.db_min_connections {
            return Err(validation(format!(
                "DATABASE_MAX_CONNECTIONS ({}) is below DATABASE_MIN_CONNECTIONS ({})",
                self.db_max_connections, self.db_min_connections
            )));
        }
        if self.max_concurrency == Some(0) {
            return Err(validation("PREP_MAX_CONCURRENCY must be at least 1"));
        }
        if self.embed_dimensions == 0 {
            return Err(validation("AZURE_OAI_EMBED_DIMENSIONS must be at least 1"));
        }
        if self.http_timeout_secs == 0 {
            return Err(validation("PREP_HTTP_TIMEOUT_SECS must be at least 1"));
        }
        if self.search_index_name.trim().is_empty() {
            return Err(validation("AZURE_SEARCH_INDEX_NAME must not be empty"));
        }
        self.log_format()?;

        Ok(())
    }

    pub fn oai_base_url(&self) -> Result<Url, ConfigError> {
        base_url("AZURE_OAI_ENDPOINT", &self.oai_endpoint)
    }

    pub fn search_base_url(&self) -> Result<Url, ConfigError> {
        base_url("AZURE_SEARCH_SERVICE_ENDPOINT", &self.search_endpoint)
    }

    pub fn oai_api_key(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(
            self.oai_api_key.as_deref(),
            self.oai_api_key_file.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: "AZURE_OAI_API_KEY",
            source,
        })
    }

    pub fn search_api_key(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(
            self.search_api_key.as_deref(),
            self.search_api_key_file.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: "AZURE_SEARCH_API_KEY",
            source,
        })
    }

    /// Number of enrichment workers allowed in flight at once.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or(self.db_max_connections as usize)
            .max(1)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn publish_policy(&self) -> PublishUnpersisted {
        PublishUnpersisted::from(self.publish_unpersisted)
    }

    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        match self.log_format.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(validation(format!(
                "PREP_LOG_FORMAT must be 'text' or 'json', got '{}'",
                other
            ))),
        }
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

/// Parses an endpoint and guarantees a trailing slash so relative joins
/// append to the path instead of replacing its last segment.
fn base_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let trimmed = value.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&with_slash).map_err(|source| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })
}
