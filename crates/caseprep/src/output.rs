//! JSON artifact with the enriched documents of a run.

use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::case::EnrichedDocument;
use crate::error::BatchError;

/// Serializes documents as a 4-space indented JSON array.
pub fn to_json(documents: &[EnrichedDocument]) -> Result<Vec<u8>, BatchError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    documents.serialize(&mut serializer)?;
    Ok(buf)
}

/// Writes the artifact, creating parent directories as needed. Any previous
/// file at `path` is replaced.
pub async fn write_documents(path: &Path, documents: &[EnrichedDocument]) -> Result<(), BatchError> {
    let json = to_json(documents)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BatchError::WriteOutput {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    tokio::fs::write(path, json)
        .await
        .map_err(|e| BatchError::WriteOutput {
            path: path.to_path_buf(),
            source: e,
        })?;

    log::info!(
        "JSON file {} created with {} documents",
        path.display(),
        documents.len()
    );
    Ok(())
}
