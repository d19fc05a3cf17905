//! Integration tests for the high-level client.
//!
//! These tests run scripted tracker and storage servers on loopback
//! sockets and drive the full flow through the public `DfsClient` API:
//! tracker selection, storage resolution, and the storage operation.

use std::time::Duration;

use driftfs_core::protocol::{
    self, CMD_QUIT, CMD_RESP, GROUP_NAME_MAX_LEN, HEADER_BYTE_LEN, IPADDR_SIZE, PKG_LEN_SIZE,
    PacketHeader, STORAGE_CMD_UPLOAD_FILE, TRACKER_CMD_LIST_GROUPS,
    TRACKER_CMD_QUERY_STORE_WITHOUT_GROUP,
};
use driftfs_core::tracker::GROUP_STAT_RECORD_LEN;
use driftfs_core::{
    ClientConfig, DfsClient, DfsError, DownloadRange, DownloadTarget, TrackerAddr, UploadOptions,
    UploadSource,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// One request captured by a scripted server.
struct CapturedRequest {
    header: PacketHeader,
    body: Vec<u8>,
}

/// Runs a scripted server that answers every non-quit request with the
/// same canned response body and reports each captured request.
///
/// Quit-only connections (the client's tracker reachability probe closes
/// this way) are accepted and dropped without a response.
async fn spawn_server(response: Vec<u8>) -> (TrackerAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (captured_tx, captured_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };

            let mut header_buf = [0u8; HEADER_BYTE_LEN];
            if socket.read_exact(&mut header_buf).await.is_err() {
                continue;
            }
            let header = PacketHeader::parse(&header_buf);
            if header.command == CMD_QUIT {
                continue;
            }

            let mut body = vec![0u8; header.body_length as usize];
            socket.read_exact(&mut body).await.unwrap();

            let mut reply = protocol::pack_header(CMD_RESP, response.len() as u64, 0).to_vec();
            reply.extend_from_slice(&response);
            socket.write_all(&reply).await.unwrap();

            let _ = captured_tx.send(CapturedRequest { header, body });

            // Drain the closing quit header, if the client sends one.
            let _ = socket.read_exact(&mut header_buf).await;
        }
    });

    (TrackerAddr::new("127.0.0.1", port), captured_rx)
}

/// Builds a tracker query response pointing at a storage address.
fn endpoint_body(group: &str, port: u16, store_path_index: Option<u8>) -> Vec<u8> {
    let host = "127.0.0.1";
    let mut body = vec![0u8; GROUP_NAME_MAX_LEN + IPADDR_SIZE - 1 + PKG_LEN_SIZE];
    body[..group.len()].copy_from_slice(group.as_bytes());
    body[GROUP_NAME_MAX_LEN..GROUP_NAME_MAX_LEN + host.len()].copy_from_slice(host.as_bytes());
    let port_offset = GROUP_NAME_MAX_LEN + IPADDR_SIZE - 1;
    body[port_offset..].copy_from_slice(&protocol::number_to_bytes(u64::from(port), PKG_LEN_SIZE));
    if let Some(index) = store_path_index {
        body.push(index);
    }
    body
}

fn test_client(tracker: TrackerAddr) -> DfsClient {
    let mut config = ClientConfig::new(vec![tracker]);
    config.timeout = Duration::from_secs(2);
    DfsClient::new(config).unwrap()
}

#[tokio::test]
async fn test_upload_empty_file_resolves_file_id() {
    let mut upload_response = vec![0u8; GROUP_NAME_MAX_LEN];
    upload_response[..6].copy_from_slice(b"group1");
    upload_response.extend_from_slice(b"M00/00/00/assigned.bin");
    let (storage_addr, mut storage_requests) = spawn_server(upload_response).await;

    let (tracker_addr, mut tracker_requests) =
        spawn_server(endpoint_body("group1", storage_addr.port, Some(2))).await;

    let client = test_client(tracker_addr);
    let file_id = client
        .upload(UploadSource::bytes(Vec::new()), UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(file_id.group(), "group1");
    assert_eq!(file_id.remote_filename(), "M00/00/00/assigned.bin");

    let tracker_request = tracker_requests.recv().await.unwrap();
    assert_eq!(
        tracker_request.header.command,
        TRACKER_CMD_QUERY_STORE_WITHOUT_GROUP
    );
    assert_eq!(tracker_request.header.body_length, 0);

    // A zero-byte upload still carries the fixed fields: store-path index
    // byte, 8-byte size, 6-byte extension field.
    let storage_request = storage_requests.recv().await.unwrap();
    assert_eq!(storage_request.header.command, STORAGE_CMD_UPLOAD_FILE);
    assert_eq!(storage_request.header.body_length, 15);
    assert_eq!(storage_request.body[0], 2, "store-path index echoed back");
}

#[tokio::test]
async fn test_download_writes_body_to_file() {
    let content = b"streamed file content, marginally larger than a header";
    let (storage_addr, _storage_requests) = spawn_server(content.to_vec()).await;
    let (tracker_addr, _tracker_requests) =
        spawn_server(endpoint_body("group1", storage_addr.port, None)).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetched.bin");

    let client = test_client(tracker_addr);
    let outcome = client
        .download(
            &"group1/M00/00/00/file.bin".parse().unwrap(),
            DownloadRange::default(),
            DownloadTarget::Path(path.clone()),
        )
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        driftfs_core::DownloadOutcome::Written(n) if n == content.len() as u64
    ));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), content);
}

#[tokio::test]
async fn test_download_to_memory() {
    let content = b"in-memory body";
    let (storage_addr, _storage_requests) = spawn_server(content.to_vec()).await;
    let (tracker_addr, _tracker_requests) =
        spawn_server(endpoint_body("group1", storage_addr.port, None)).await;

    let client = test_client(tracker_addr);
    let outcome = client
        .download(
            &"group1/M00/00/00/file.bin".parse().unwrap(),
            DownloadRange::default(),
            DownloadTarget::Memory,
        )
        .await
        .unwrap();

    assert_eq!(&outcome.into_bytes().unwrap()[..], content);
}

#[tokio::test]
async fn test_all_trackers_refused() {
    // Bind and drop listeners so both ports are known closed.
    let mut trackers = Vec::new();
    for _ in 0..2 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        trackers.push(TrackerAddr::new(
            "127.0.0.1",
            listener.local_addr().unwrap().port(),
        ));
        drop(listener);
    }

    let mut config = ClientConfig::new(trackers);
    config.timeout = Duration::from_millis(500);
    let client = DfsClient::new(config).unwrap();

    let result = client
        .upload(UploadSource::bytes(b"data".to_vec()), UploadOptions::default())
        .await;
    assert!(matches!(result, Err(DfsError::NoTrackersAvailable)));
}

#[tokio::test]
async fn test_list_groups_end_to_end() {
    let mut body = Vec::new();
    for name in ["group1", "group2"] {
        let mut record = vec![0u8; GROUP_STAT_RECORD_LEN];
        record[..name.len()].copy_from_slice(name.as_bytes());
        let total_mb_offset = GROUP_NAME_MAX_LEN + 1;
        record[total_mb_offset..total_mb_offset + PKG_LEN_SIZE]
            .copy_from_slice(&protocol::number_to_bytes(4096, PKG_LEN_SIZE));
        body.extend_from_slice(&record);
    }
    let (tracker_addr, mut tracker_requests) = spawn_server(body).await;

    let client = test_client(tracker_addr);
    let groups = client.list_groups().await.unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].name, "group1");
    assert_eq!(groups[1].name, "group2");
    assert_eq!(groups[0].total_mb, 4096);

    let request = tracker_requests.recv().await.unwrap();
    assert_eq!(request.header.command, TRACKER_CMD_LIST_GROUPS);
    assert_eq!(request.header.body_length, 0);
}

#[tokio::test]
async fn test_server_error_code_surfaces() {
    // A tracker that answers every query with status 2 (no such file).
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tracker_addr = TrackerAddr::new("127.0.0.1", listener.local_addr().unwrap().port());
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            let mut header_buf = [0u8; HEADER_BYTE_LEN];
            if socket.read_exact(&mut header_buf).await.is_err() {
                continue;
            }
            if PacketHeader::parse(&header_buf).command == CMD_QUIT {
                continue;
            }
            let mut body = vec![0u8; PacketHeader::parse(&header_buf).body_length as usize];
            socket.read_exact(&mut body).await.unwrap();
            socket
                .write_all(&protocol::pack_header(CMD_RESP, 0, 2))
                .await
                .unwrap();
        }
    });

    let client = test_client(tracker_addr);
    let result = client
        .delete(&"group1/M00/00/00/gone.bin".parse().unwrap())
        .await;
    assert!(matches!(result, Err(DfsError::Server { code: 2 })));
}
