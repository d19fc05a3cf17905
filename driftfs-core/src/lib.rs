//! Driftfs Core - Client for a tracker/storage distributed file protocol
//!
//! This crate implements the client side of a binary tracker/storage file
//! protocol: a tracker server resolves a logical file or group to a concrete
//! storage server, and the client then speaks a second framed protocol to
//! that storage server to upload, download, delete, or annotate files.

pub mod client;
pub mod config;
pub mod connection;
pub mod file_id;
pub mod protocol;
pub mod source;
pub mod storage;
pub mod tracker;

// Re-export main types for convenient access
pub use client::{DfsClient, TrackerRotation, UploadOptions};
pub use config::{ClientConfig, TrackerAddr};
pub use file_id::FileId;
pub use source::{DownloadOutcome, DownloadTarget, UploadSource};
pub use storage::{
    DownloadRange, FileInfo, MetaData, SetMetadataFlag, StorageClient, StorageEndpoint, UploadMode,
};
pub use tracker::{GroupStat, StorageStat, StorageStatus, TrackerClient};

/// Errors that can occur during client operations.
///
/// Covers all failure modes: configuration problems detected before any
/// network traffic, per-endpoint connection failures, malformed protocol
/// frames, and application-level errors reported by the server as a
/// non-zero status byte.
#[derive(Debug, thiserror::Error)]
pub enum DfsError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Connection to {endpoint} timed out")]
    ConnectionTimeout { endpoint: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Server returned error code {code}")]
    Server { code: u8 },

    #[error("No trackers available, every configured tracker refused the connection")]
    NoTrackersAvailable,

    #[error("Invalid file id: {id}")]
    InvalidFileId { id: String },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl DfsError {
    /// Numeric error code carried by a server-reported failure, if any.
    ///
    /// Non-zero status bytes map to well-known errno values on the server
    /// side (2 = no such file, 28 = no space left, ...).
    pub fn server_code(&self) -> Option<u8> {
        match self {
            DfsError::Server { code } => Some(*code),
            _ => None,
        }
    }

    /// Checks if this error was detected before any network I/O.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            DfsError::Configuration { .. } | DfsError::InvalidFileId { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DfsError>;
