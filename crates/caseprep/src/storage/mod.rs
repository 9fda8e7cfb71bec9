//! Blob storage for case images.

pub mod blob;
pub mod connection_string;
pub mod container;

pub use blob::{BlobStore, UploadOutcome};
pub use connection_string::ConnectionString;
pub use container::{AzureContainerClient, ContainerProvisioner};
