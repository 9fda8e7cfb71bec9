//! Secret resolution for service API keys.
//!
//! A key can be given in two ways, checked in priority order:
//!
//! 1. **Direct value** - e.g. `AZURE_OAI_API_KEY=...` for local runs
//! 2. **File reference** - e.g. `AZURE_OAI_API_KEY_FILE=/run/secrets/oai-key`
//!    for the Docker/Kubernetes secrets pattern

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need a direct value or a file path)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from a direct value or, failing that, from a file.
///
/// Empty direct values are treated as absent. File contents are trimmed so a
/// trailing newline in a mounted secret does not end up in request headers.
pub fn resolve_secret(direct: Option<&str>, file_path: Option<&str>) -> Result<SecretString> {
    if let Some(value) = direct {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(SecretString::from(trimmed));
        }
    }

    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                path: expanded.clone(),
                source: e,
            })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SecretError::EmptyFile { path: expanded });
            }
            return Ok(SecretString::from(trimmed));
        }
    }

    Err(SecretError::NoSourceProvided)
}

/// Expands a leading `~/` to the current user's home directory.
fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return std::path::Path::new(&home)
                .join(rest)
                .to_string_lossy()
                .into_owned();
        }
    }
    path.to_string()
}
