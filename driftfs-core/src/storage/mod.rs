//! Storage server operations: upload, append, modify, truncate, delete,
//! metadata, download, and file info.

pub mod client;
pub mod types;

// Re-export public API
pub use client::StorageClient;
pub use types::{DownloadRange, FileInfo, SetMetadataFlag, StorageEndpoint, UploadMode};

pub use crate::protocol::codec::MetaData;
