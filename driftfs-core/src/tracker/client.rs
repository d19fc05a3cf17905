//! Tracker client: one fresh connection per query.

use std::time::Duration;

use bytes::{BufMut, Bytes};

use super::types::{GROUP_STAT_RECORD_LEN, GroupStat, STORAGE_STAT_RECORD_LEN, StorageStat};
use crate::config::TrackerAddr;
use crate::connection::Connection;
use crate::protocol::{
    self, CMD_RESP, GROUP_NAME_MAX_LEN, IPADDR_SIZE, TRACKER_CMD_LIST_GROUPS,
    TRACKER_CMD_LIST_STORAGES, TRACKER_CMD_QUERY_FETCH, TRACKER_CMD_QUERY_STORE_WITH_GROUP,
    TRACKER_CMD_QUERY_STORE_WITHOUT_GROUP, TRACKER_CMD_QUERY_UPDATE,
    TRACKER_QUERY_FETCH_BODY_LEN, TRACKER_QUERY_STORE_BODY_LEN,
};
use crate::storage::StorageEndpoint;
use crate::{DfsError, FileId, Result};

/// Client for one tracker server.
pub struct TrackerClient {
    addr: TrackerAddr,
    timeout: Duration,
}

impl TrackerClient {
    pub fn new(addr: TrackerAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    /// The tracker this client queries.
    pub fn addr(&self) -> &TrackerAddr {
        &self.addr
    }

    async fn connect(&self) -> Result<Connection> {
        Connection::open(&self.addr.host, self.addr.port, self.timeout).await
    }

    /// Asks which storage server should receive a new upload, in the given
    /// group or in one of the tracker's choosing.
    ///
    /// The response carries a store-path index byte after the address,
    /// which the upload request must echo back.
    ///
    /// # Errors
    /// - `DfsError::Configuration` - Group name longer than its 16-byte field
    /// - `DfsError::Server` - Tracker has no writable storage
    pub async fn store_storage(&self, group: Option<&str>) -> Result<StorageEndpoint> {
        let request = match group {
            Some(group) => {
                if group.len() > GROUP_NAME_MAX_LEN {
                    return Err(DfsError::Configuration {
                        reason: format!("group name '{group}' exceeds {GROUP_NAME_MAX_LEN} bytes"),
                    });
                }
                let mut request =
                    Vec::with_capacity(protocol::HEADER_BYTE_LEN + GROUP_NAME_MAX_LEN);
                request.put_slice(&protocol::pack_header(
                    TRACKER_CMD_QUERY_STORE_WITH_GROUP,
                    GROUP_NAME_MAX_LEN as u64,
                    0,
                ));
                let mut group_field = [0u8; GROUP_NAME_MAX_LEN];
                protocol::write_padded(&mut group_field, group);
                request.put_slice(&group_field);
                request
            }
            None => protocol::pack_header(TRACKER_CMD_QUERY_STORE_WITHOUT_GROUP, 0, 0).to_vec(),
        };

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        let body = conn
            .receive_response(CMD_RESP, Some(TRACKER_QUERY_STORE_BODY_LEN as u64))
            .await?;

        let mut endpoint = parse_endpoint(&body);
        endpoint.store_path_index = body[TRACKER_QUERY_STORE_BODY_LEN - 1];
        tracing::debug!(
            group = %endpoint.group,
            host = %endpoint.host,
            port = endpoint.port,
            "tracker assigned store server"
        );
        Ok(endpoint)
    }

    /// Asks which storage server holds a file, for download.
    pub async fn fetch_storage(&self, file_id: &FileId) -> Result<StorageEndpoint> {
        self.query_storage(TRACKER_CMD_QUERY_FETCH, file_id).await
    }

    /// Asks which storage server to send an update (append, modify,
    /// delete, metadata) for an existing file.
    pub async fn update_storage(&self, file_id: &FileId) -> Result<StorageEndpoint> {
        self.query_storage(TRACKER_CMD_QUERY_UPDATE, file_id).await
    }

    async fn query_storage(&self, command: u8, file_id: &FileId) -> Result<StorageEndpoint> {
        let request =
            protocol::pack_file_id(command, file_id.group(), file_id.remote_filename());

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        let body = conn
            .receive_response(CMD_RESP, Some(TRACKER_QUERY_FETCH_BODY_LEN as u64))
            .await?;

        Ok(parse_endpoint(&body))
    }

    /// Lists every group the tracker knows, with capacity counters.
    pub async fn list_groups(&self) -> Result<Vec<GroupStat>> {
        let mut conn = self.connect().await?;
        conn.send(&protocol::pack_header(TRACKER_CMD_LIST_GROUPS, 0, 0))
            .await?;
        let body = conn.receive_response(CMD_RESP, None).await?;

        split_records(&body, GROUP_STAT_RECORD_LEN, "group stat")
            .map(|records| records.map(GroupStat::parse_record).collect())
    }

    /// Lists the storage servers of one group, with status and counters.
    pub async fn list_storages(&self, group: &str) -> Result<Vec<StorageStat>> {
        if group.len() > GROUP_NAME_MAX_LEN {
            return Err(DfsError::Configuration {
                reason: format!("group name '{group}' exceeds {GROUP_NAME_MAX_LEN} bytes"),
            });
        }

        let mut request = Vec::with_capacity(protocol::HEADER_BYTE_LEN + GROUP_NAME_MAX_LEN);
        request.put_slice(&protocol::pack_header(
            TRACKER_CMD_LIST_STORAGES,
            GROUP_NAME_MAX_LEN as u64,
            0,
        ));
        let mut group_field = [0u8; GROUP_NAME_MAX_LEN];
        protocol::write_padded(&mut group_field, group);
        request.put_slice(&group_field);

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        let body = conn.receive_response(CMD_RESP, None).await?;

        split_records(&body, STORAGE_STAT_RECORD_LEN, "storage stat")
            .map(|records| records.map(StorageStat::parse_record).collect())
    }
}

/// Parses the common prefix of tracker query responses: 16-byte group
/// field, 15-byte address field, 8-byte port.
fn parse_endpoint(body: &Bytes) -> StorageEndpoint {
    let group = String::from_utf8_lossy(&body[..GROUP_NAME_MAX_LEN]);
    let addr_end = GROUP_NAME_MAX_LEN + IPADDR_SIZE - 1;
    let host = String::from_utf8_lossy(&body[GROUP_NAME_MAX_LEN..addr_end]);
    let port = protocol::read_u64(body, addr_end);

    StorageEndpoint {
        group: protocol::trim_padding(&group).to_string(),
        host: protocol::trim_padding(&host).to_string(),
        port: port as u16,
        store_path_index: 0,
    }
}

fn split_records<'a>(
    body: &'a Bytes,
    record_len: usize,
    kind: &str,
) -> Result<impl Iterator<Item = &'a [u8]>> {
    if body.len() % record_len != 0 {
        return Err(DfsError::Protocol {
            message: format!(
                "{kind} body length {} is not a multiple of the {record_len}-byte record",
                body.len()
            ),
        });
    }
    Ok(body.chunks_exact(record_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PKG_LEN_SIZE, number_to_bytes};

    fn query_body(group: &str, host: &str, port: u64, extra: Option<u8>) -> Bytes {
        let mut body = vec![0u8; TRACKER_QUERY_FETCH_BODY_LEN];
        body[..group.len()].copy_from_slice(group.as_bytes());
        body[GROUP_NAME_MAX_LEN..GROUP_NAME_MAX_LEN + host.len()]
            .copy_from_slice(host.as_bytes());
        let addr_end = GROUP_NAME_MAX_LEN + IPADDR_SIZE - 1;
        body[addr_end..].copy_from_slice(&number_to_bytes(port, PKG_LEN_SIZE));
        if let Some(index) = extra {
            body.push(index);
        }
        Bytes::from(body)
    }

    #[test]
    fn test_parse_endpoint() {
        let body = query_body("group1", "192.168.1.20", 23000, None);
        let endpoint = parse_endpoint(&body);
        assert_eq!(endpoint.group, "group1");
        assert_eq!(endpoint.host, "192.168.1.20");
        assert_eq!(endpoint.port, 23000);
        assert_eq!(endpoint.store_path_index, 0);
    }

    #[test]
    fn test_store_body_carries_path_index() {
        let body = query_body("group2", "10.0.0.9", 23001, Some(3));
        assert_eq!(body.len(), TRACKER_QUERY_STORE_BODY_LEN);
        let mut endpoint = parse_endpoint(&body);
        endpoint.store_path_index = body[TRACKER_QUERY_STORE_BODY_LEN - 1];
        assert_eq!(endpoint.store_path_index, 3);
    }

    #[tokio::test]
    async fn test_store_storage_rejects_oversized_group() {
        // Fails before any socket is opened; the endpoint is fictional.
        let client = TrackerClient::new(
            TrackerAddr::new("127.0.0.1", 22122),
            std::time::Duration::from_secs(1),
        );
        let result = client
            .store_storage(Some("a-group-name-past-sixteen-bytes"))
            .await;
        assert!(matches!(result, Err(DfsError::Configuration { .. })));
    }

    #[test]
    fn test_split_records_rejects_partial_record() {
        let body = Bytes::from(vec![0u8; GROUP_STAT_RECORD_LEN + 1]);
        assert!(matches!(
            split_records(&body, GROUP_STAT_RECORD_LEN, "group stat"),
            Err(DfsError::Protocol { .. })
        ));
    }

    #[test]
    fn test_split_records_counts_whole_records() {
        let body = Bytes::from(vec![0u8; 2 * GROUP_STAT_RECORD_LEN]);
        let records: Vec<_> = split_records(&body, GROUP_STAT_RECORD_LEN, "group stat")
            .unwrap()
            .collect();
        assert_eq!(records.len(), 2);
    }
}
