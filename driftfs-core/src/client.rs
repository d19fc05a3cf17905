//! High-level client: tracker selection, failover, and operation routing.
//!
//! Every operation resolves a tracker first (rotating through the
//! configured list, skipping unreachable ones), asks it for the right
//! storage server, then runs the storage operation against that server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{ClientConfig, TrackerAddr};
use crate::connection::Connection;
use crate::protocol::FILE_EXT_NAME_MAX_LEN;
use crate::source::{DownloadOutcome, DownloadTarget, UploadSource};
use crate::storage::{
    DownloadRange, FileInfo, MetaData, SetMetadataFlag, StorageClient, StorageEndpoint, UploadMode,
};
use crate::tracker::{GroupStat, StorageStat, TrackerClient};
use crate::{DfsError, FileId, Result};

/// Round-robin tracker selection with connect-probe failover.
///
/// Each selection starts one past where the previous one started and
/// makes a single pass over the list; the first tracker that accepts a
/// TCP connect wins. No tracker is tried twice in one pass.
pub struct TrackerRotation {
    trackers: Vec<TrackerAddr>,
    next: AtomicUsize,
}

impl TrackerRotation {
    pub fn new(trackers: Vec<TrackerAddr>) -> Self {
        Self {
            trackers,
            next: AtomicUsize::new(0),
        }
    }

    /// Returns a client for the first reachable tracker.
    ///
    /// # Errors
    /// - `DfsError::NoTrackersAvailable` - Every tracker refused or timed out
    pub async fn select(&self, timeout: Duration) -> Result<TrackerClient> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        for i in 0..self.trackers.len() {
            let addr = &self.trackers[(start + i) % self.trackers.len()];
            match Connection::open(&addr.host, addr.port, timeout).await {
                Ok(conn) => {
                    conn.close().await;
                    return Ok(TrackerClient::new(addr.clone(), timeout));
                }
                Err(err) => {
                    tracing::warn!(tracker = %addr, error = %err, "tracker unreachable, trying next");
                }
            }
        }
        Err(DfsError::NoTrackersAvailable)
    }
}

/// Options for an upload: target group, extension override, and mode.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Group to store into; `None` lets the tracker choose.
    pub group: Option<String>,
    /// Extension override; `None` falls back to the source path's
    /// extension, then to the configured default.
    pub ext: Option<String>,
    pub mode: UploadMode,
}

/// Client for a whole cluster: a tracker list plus per-call storage routing.
pub struct DfsClient {
    config: ClientConfig,
    rotation: TrackerRotation,
}

impl DfsClient {
    /// Creates a client from a validated configuration.
    ///
    /// # Errors
    /// - `DfsError::Configuration` - Empty tracker list or malformed address
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let rotation = TrackerRotation::new(config.trackers.clone());
        Ok(Self { config, rotation })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn tracker(&self) -> Result<TrackerClient> {
        self.rotation.select(self.config.timeout).await
    }

    fn storage(&self, endpoint: StorageEndpoint) -> StorageClient {
        StorageClient::new(endpoint, self.config.timeout)
    }

    /// Uploads a file and returns its cluster-wide id.
    ///
    /// Create modes ask the tracker for a store server (honoring the group
    /// option); append and modify route to the server that owns the
    /// existing file.
    pub async fn upload(&self, source: UploadSource, options: UploadOptions) -> Result<FileId> {
        let ext = self.resolve_extension(&source, options.ext.as_deref())?;
        let tracker = self.tracker().await?;

        let endpoint = match &options.mode {
            UploadMode::Create | UploadMode::CreateAppendable => {
                tracker.store_storage(options.group.as_deref()).await?
            }
            UploadMode::Append { file_id } | UploadMode::Modify { file_id, .. } => {
                tracker.update_storage(file_id).await?
            }
        };

        self.storage(endpoint).upload(source, &ext, options.mode).await
    }

    /// Downloads a file, or a byte range of it, into the given target.
    pub async fn download(
        &self,
        file_id: &FileId,
        range: DownloadRange,
        target: DownloadTarget,
    ) -> Result<DownloadOutcome> {
        let endpoint = self.tracker().await?.fetch_storage(file_id).await?;
        self.storage(endpoint).download(file_id, range, target).await
    }

    /// Deletes a stored file.
    pub async fn delete(&self, file_id: &FileId) -> Result<()> {
        let endpoint = self.tracker().await?.update_storage(file_id).await?;
        self.storage(endpoint).delete(file_id).await
    }

    /// Truncates an appendable file to `size` bytes.
    pub async fn truncate(&self, file_id: &FileId, size: u64) -> Result<()> {
        let endpoint = self.tracker().await?.update_storage(file_id).await?;
        self.storage(endpoint).truncate(file_id, size).await
    }

    /// Replaces or merges the metadata attached to a file.
    pub async fn set_metadata(
        &self,
        file_id: &FileId,
        meta: &MetaData,
        flag: SetMetadataFlag,
    ) -> Result<()> {
        let endpoint = self.tracker().await?.update_storage(file_id).await?;
        self.storage(endpoint).set_metadata(file_id, meta, flag).await
    }

    /// Fetches the metadata attached to a file.
    pub async fn get_metadata(&self, file_id: &FileId) -> Result<MetaData> {
        let endpoint = self.tracker().await?.update_storage(file_id).await?;
        self.storage(endpoint).get_metadata(file_id).await
    }

    /// Queries size, creation time, crc32, and source address of a file.
    pub async fn file_info(&self, file_id: &FileId) -> Result<FileInfo> {
        let endpoint = self.tracker().await?.update_storage(file_id).await?;
        self.storage(endpoint).file_info(file_id).await
    }

    /// Lists every group in the cluster.
    pub async fn list_groups(&self) -> Result<Vec<GroupStat>> {
        self.tracker().await?.list_groups().await
    }

    /// Lists the storage servers of one group.
    pub async fn list_storages(&self, group: &str) -> Result<Vec<StorageStat>> {
        self.tracker().await?.list_storages(group).await
    }

    /// Picks the extension to send: explicit option, then the source
    /// path's own extension, then the configured default. A leading dot
    /// is stripped; the result must fit the 6-byte wire field.
    fn resolve_extension(&self, source: &UploadSource, ext: Option<&str>) -> Result<String> {
        let ext = ext
            .map(str::to_string)
            .or_else(|| source.extension())
            .unwrap_or_else(|| self.config.default_extension.clone());
        let ext = ext.strip_prefix('.').unwrap_or(&ext).to_string();
        if ext.len() > FILE_EXT_NAME_MAX_LEN {
            return Err(DfsError::Configuration {
                reason: format!("file extension '{ext}' exceeds {FILE_EXT_NAME_MAX_LEN} bytes"),
            });
        }
        Ok(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(trackers: Vec<TrackerAddr>) -> DfsClient {
        DfsClient::new(ClientConfig::new(trackers)).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_tracker_list() {
        assert!(matches!(
            DfsClient::new(ClientConfig::new(Vec::new())),
            Err(DfsError::Configuration { .. })
        ));
    }

    #[test]
    fn test_resolve_extension_precedence() {
        let client = test_client(vec![TrackerAddr {
            host: "127.0.0.1".to_string(),
            port: 22122,
        }]);

        let from_path = UploadSource::path("/tmp/photo.jpeg");
        assert_eq!(
            client.resolve_extension(&from_path, None).unwrap(),
            "jpeg"
        );
        assert_eq!(
            client.resolve_extension(&from_path, Some(".png")).unwrap(),
            "png"
        );

        let from_bytes = UploadSource::bytes(b"raw".to_vec());
        assert_eq!(client.resolve_extension(&from_bytes, None).unwrap(), "");
    }

    #[test]
    fn test_resolve_extension_rejects_oversized() {
        let client = test_client(vec![TrackerAddr {
            host: "127.0.0.1".to_string(),
            port: 22122,
        }]);
        let source = UploadSource::bytes(Vec::new());
        assert!(matches!(
            client.resolve_extension(&source, Some("longext7")),
            Err(DfsError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_rotation_exhausts_dead_trackers() {
        // Bind and drop two listeners so both ports are known closed.
        let mut trackers = Vec::new();
        for _ in 0..2 {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            trackers.push(TrackerAddr {
                host: "127.0.0.1".to_string(),
                port: listener.local_addr().unwrap().port(),
            });
            drop(listener);
        }

        let rotation = TrackerRotation::new(trackers);
        let result = rotation.select(Duration::from_millis(500)).await;
        assert!(matches!(result, Err(DfsError::NoTrackersAvailable)));
    }

    #[tokio::test]
    async fn test_rotation_advances_between_selections() {
        let listener_a = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listener_b = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let trackers = vec![
            TrackerAddr {
                host: "127.0.0.1".to_string(),
                port: listener_a.local_addr().unwrap().port(),
            },
            TrackerAddr {
                host: "127.0.0.1".to_string(),
                port: listener_b.local_addr().unwrap().port(),
            },
        ];
        // Accept probes in the background so selection can finish.
        for listener in [listener_a, listener_b] {
            tokio::spawn(async move {
                loop {
                    let _ = listener.accept().await;
                }
            });
        }

        let rotation = TrackerRotation::new(trackers.clone());
        let first = rotation.select(Duration::from_secs(1)).await.unwrap();
        let second = rotation.select(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first.addr(), &trackers[0]);
        assert_eq!(second.addr(), &trackers[1]);
    }
}
