//! Storage client: one fresh connection per operation.
//!
//! Every operation writes the header, then the fixed body fields, then the
//! file payload if any, in that order, and only then reads the framed
//! response. The server parses the stream strictly in that order.

use std::time::Duration;

use bytes::{BufMut, Bytes};

use super::types::{
    DownloadRange, FILE_INFO_BODY_LEN, FileInfo, SetMetadataFlag, StorageEndpoint,
    UPLOAD_RESPONSE_MIN_LEN, UploadMode,
};
use crate::connection::{Connection, READ_BUF_SIZE};
use crate::protocol::{
    self, CMD_RESP, FILE_EXT_NAME_MAX_LEN, GROUP_NAME_MAX_LEN, MetaData, PKG_LEN_SIZE,
    PacketReceiver, RecvEvent, STORAGE_CMD_APPEND_FILE, STORAGE_CMD_DELETE_FILE,
    STORAGE_CMD_DOWNLOAD_FILE, STORAGE_CMD_GET_METADATA, STORAGE_CMD_MODIFY_FILE,
    STORAGE_CMD_QUERY_FILE_INFO, STORAGE_CMD_SET_METADATA, STORAGE_CMD_TRUNCATE_FILE,
};
use crate::source::{DownloadOutcome, DownloadTarget, UploadSource};
use crate::{DfsError, FileId, Result};

/// Client for one resolved storage server.
///
/// Stateless per call: every operation opens its own connection and closes
/// it at completion, so a `StorageClient` can drive concurrent operations.
pub struct StorageClient {
    endpoint: StorageEndpoint,
    timeout: Duration,
}

impl StorageClient {
    /// Creates a client for a storage endpoint resolved by a tracker.
    pub fn new(endpoint: StorageEndpoint, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &StorageEndpoint {
        &self.endpoint
    }

    async fn connect(&self) -> Result<Connection> {
        Connection::open(&self.endpoint.host, self.endpoint.port, self.timeout).await
    }

    /// Uploads a file, dispatching on the requested mode.
    ///
    /// Create modes return the server-assigned file id; append and modify
    /// return the id of the file they changed.
    ///
    /// # Errors
    /// - `DfsError::Configuration` - Extension longer than its 6-byte field
    /// - `DfsError::Server` / `DfsError::Protocol` - Rejected or malformed response
    pub async fn upload(
        &self,
        source: UploadSource,
        ext: &str,
        mode: UploadMode,
    ) -> Result<FileId> {
        match mode {
            UploadMode::Create => {
                self.upload_create(protocol::STORAGE_CMD_UPLOAD_FILE, source, ext)
                    .await
            }
            UploadMode::CreateAppendable => {
                self.upload_create(protocol::STORAGE_CMD_UPLOAD_APPENDER_FILE, source, ext)
                    .await
            }
            UploadMode::Append { file_id } => {
                self.append(&file_id, source).await?;
                Ok(file_id)
            }
            UploadMode::Modify { file_id, offset } => {
                self.modify(&file_id, offset, source).await?;
                Ok(file_id)
            }
        }
    }

    /// Request body: store-path index byte, 8-byte size, 6-byte extension
    /// field, then the file content. Response body: 16-byte group plus the
    /// assigned filename.
    async fn upload_create(
        &self,
        command: u8,
        source: UploadSource,
        ext: &str,
    ) -> Result<FileId> {
        if ext.len() > FILE_EXT_NAME_MAX_LEN {
            return Err(DfsError::Configuration {
                reason: format!("file extension '{ext}' exceeds {FILE_EXT_NAME_MAX_LEN} bytes"),
            });
        }

        let (size, mut reader) = source.into_reader().await?;
        tracing::debug!(
            endpoint = %self.endpoint.host,
            size,
            "uploading file to storage server"
        );

        let fixed_len = 1 + PKG_LEN_SIZE + FILE_EXT_NAME_MAX_LEN;
        let body_length = fixed_len as u64 + size;

        let mut request = Vec::with_capacity(protocol::HEADER_BYTE_LEN + fixed_len);
        request.put_slice(&protocol::pack_header(command, body_length, 0));
        request.put_u8(self.endpoint.store_path_index);
        request.put_slice(&protocol::number_to_bytes(size, PKG_LEN_SIZE));
        let mut ext_field = [0u8; FILE_EXT_NAME_MAX_LEN];
        protocol::write_padded(&mut ext_field, ext);
        request.put_slice(&ext_field);

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        conn.send_payload(reader.as_mut(), size).await?;

        let body = conn.receive_response(CMD_RESP, None).await?;
        parse_upload_response(&body)
    }

    /// Appends to an appendable file. Request body: 8-byte filename
    /// length, 8-byte size, filename, file content. Empty response body.
    pub async fn append(&self, file_id: &FileId, source: UploadSource) -> Result<()> {
        let (size, mut reader) = source.into_reader().await?;
        let filename = file_id.remote_filename().as_bytes();
        let body_length = (2 * PKG_LEN_SIZE + filename.len()) as u64 + size;

        let mut request = Vec::new();
        request.put_slice(&protocol::pack_header(STORAGE_CMD_APPEND_FILE, body_length, 0));
        request.put_slice(&protocol::number_to_bytes(filename.len() as u64, PKG_LEN_SIZE));
        request.put_slice(&protocol::number_to_bytes(size, PKG_LEN_SIZE));
        request.put_slice(filename);

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        conn.send_payload(reader.as_mut(), size).await?;

        conn.receive_response(CMD_RESP, Some(0)).await?;
        Ok(())
    }

    /// Overwrites a range of an appendable file. Request body: 8-byte
    /// filename length, 8-byte offset, 8-byte size, filename, content.
    pub async fn modify(&self, file_id: &FileId, offset: u64, source: UploadSource) -> Result<()> {
        let (size, mut reader) = source.into_reader().await?;
        let filename = file_id.remote_filename().as_bytes();
        let body_length = (3 * PKG_LEN_SIZE + filename.len()) as u64 + size;

        let mut request = Vec::new();
        request.put_slice(&protocol::pack_header(STORAGE_CMD_MODIFY_FILE, body_length, 0));
        request.put_slice(&protocol::number_to_bytes(filename.len() as u64, PKG_LEN_SIZE));
        request.put_slice(&protocol::number_to_bytes(offset, PKG_LEN_SIZE));
        request.put_slice(&protocol::number_to_bytes(size, PKG_LEN_SIZE));
        request.put_slice(filename);

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        conn.send_payload(reader.as_mut(), size).await?;

        conn.receive_response(CMD_RESP, Some(0)).await?;
        Ok(())
    }

    /// Truncates an appendable file to `size` bytes. Request body: 8-byte
    /// filename length, 8-byte truncated size, filename.
    pub async fn truncate(&self, file_id: &FileId, size: u64) -> Result<()> {
        let filename = file_id.remote_filename().as_bytes();
        let body_length = (2 * PKG_LEN_SIZE + filename.len()) as u64;

        let mut request = Vec::new();
        request.put_slice(&protocol::pack_header(
            STORAGE_CMD_TRUNCATE_FILE,
            body_length,
            0,
        ));
        request.put_slice(&protocol::number_to_bytes(filename.len() as u64, PKG_LEN_SIZE));
        request.put_slice(&protocol::number_to_bytes(size, PKG_LEN_SIZE));
        request.put_slice(filename);

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        conn.receive_response(CMD_RESP, Some(0)).await?;
        Ok(())
    }

    /// Deletes a stored file.
    pub async fn delete(&self, file_id: &FileId) -> Result<()> {
        let request = protocol::pack_file_id(
            STORAGE_CMD_DELETE_FILE,
            file_id.group(),
            file_id.remote_filename(),
        );

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        conn.receive_response(CMD_RESP, Some(0)).await?;
        Ok(())
    }

    /// Replaces or merges the metadata attached to a file.
    ///
    /// Request body: 8-byte filename length, 8-byte metadata length, flag
    /// byte, 16-byte group field, filename, packed metadata.
    pub async fn set_metadata(
        &self,
        file_id: &FileId,
        meta: &MetaData,
        flag: SetMetadataFlag,
    ) -> Result<()> {
        let packed = protocol::pack_metadata(meta);
        let filename = file_id.remote_filename().as_bytes();
        let body_length =
            2 * PKG_LEN_SIZE + 1 + GROUP_NAME_MAX_LEN + filename.len() + packed.len();

        let mut request = Vec::with_capacity(protocol::HEADER_BYTE_LEN + body_length);
        request.put_slice(&protocol::pack_header(
            STORAGE_CMD_SET_METADATA,
            body_length as u64,
            0,
        ));
        request.put_slice(&protocol::number_to_bytes(filename.len() as u64, PKG_LEN_SIZE));
        request.put_slice(&protocol::number_to_bytes(packed.len() as u64, PKG_LEN_SIZE));
        request.put_u8(flag.as_byte());
        let mut group_field = [0u8; GROUP_NAME_MAX_LEN];
        protocol::write_padded(&mut group_field, file_id.group());
        request.put_slice(&group_field);
        request.put_slice(filename);
        request.put_slice(packed.as_bytes());

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        conn.receive_response(CMD_RESP, Some(0)).await?;
        Ok(())
    }

    /// Fetches the metadata attached to a file. A file without metadata
    /// yields an empty map.
    pub async fn get_metadata(&self, file_id: &FileId) -> Result<MetaData> {
        let request = protocol::pack_file_id(
            STORAGE_CMD_GET_METADATA,
            file_id.group(),
            file_id.remote_filename(),
        );

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        let body = conn.receive_response(CMD_RESP, None).await?;

        let raw = String::from_utf8_lossy(&body);
        Ok(protocol::parse_metadata(&raw))
    }

    /// Queries size, creation time, crc32, and source address of a file.
    pub async fn file_info(&self, file_id: &FileId) -> Result<FileInfo> {
        let request = protocol::pack_file_id(
            STORAGE_CMD_QUERY_FILE_INFO,
            file_id.group(),
            file_id.remote_filename(),
        );

        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        let body = conn
            .receive_response(CMD_RESP, Some(FILE_INFO_BODY_LEN as u64))
            .await?;
        Ok(FileInfo::parse(&body))
    }

    /// Downloads a file, streaming each chunk to the target as it arrives.
    ///
    /// Request body: 8-byte offset, 8-byte length (zero meaning "to the
    /// end"), 16-byte group field, filename. The response is consumed in
    /// header-only mode; once the declared body length has been forwarded
    /// the sink is finalized and only then is the connection closed.
    pub async fn download(
        &self,
        file_id: &FileId,
        range: DownloadRange,
        target: DownloadTarget,
    ) -> Result<DownloadOutcome> {
        let filename = file_id.remote_filename().as_bytes();
        let body_length = 2 * PKG_LEN_SIZE + GROUP_NAME_MAX_LEN + filename.len();

        let mut request = Vec::with_capacity(protocol::HEADER_BYTE_LEN + body_length);
        request.put_slice(&protocol::pack_header(
            STORAGE_CMD_DOWNLOAD_FILE,
            body_length as u64,
            0,
        ));
        request.put_slice(&protocol::number_to_bytes(range.offset, PKG_LEN_SIZE));
        request.put_slice(&protocol::number_to_bytes(range.length, PKG_LEN_SIZE));
        let mut group_field = [0u8; GROUP_NAME_MAX_LEN];
        protocol::write_padded(&mut group_field, file_id.group());
        request.put_slice(&group_field);
        request.put_slice(filename);

        let mut conn = self.connect().await?;
        conn.send(&request).await?;

        let mut sink = target.open().await?;
        let mut receiver = PacketReceiver::header_only(CMD_RESP);
        let mut received = 0u64;

        let mut buf = vec![0u8; READ_BUF_SIZE];
        let result = loop {
            let read = match conn.read_chunk(&mut buf).await {
                Ok(Some(read)) => read,
                Ok(None) => {
                    break Err(DfsError::ConnectionFailed {
                        endpoint: conn.endpoint().to_string(),
                        reason: format!(
                            "connection closed after {received} of {} body bytes",
                            receiver.declared_body_length().unwrap_or(0)
                        ),
                    });
                }
                Err(err) => break Err(err),
            };

            let events = match receiver.feed(&buf[..read]) {
                Ok(events) => events,
                Err(err) => break Err(err),
            };
            let mut failed = None;
            for event in events {
                match event {
                    RecvEvent::Header(header) => {
                        tracing::debug!(body_length = header.body_length, "download started");
                    }
                    RecvEvent::Chunk(chunk) => {
                        received += chunk.len() as u64;
                        if let Err(err) = sink.write(&chunk).await {
                            failed = Some(err);
                            break;
                        }
                    }
                    RecvEvent::Body(_) => {}
                }
            }
            if let Some(err) = failed {
                break Err(err);
            }
            if receiver.is_complete() {
                break Ok(());
            }
        };

        match result {
            Ok(()) => {
                // Finalize the sink before tearing the connection down so a
                // slow flush cannot lose tail bytes.
                let outcome = sink.finalize(received).await?;
                conn.close().await;
                Ok(outcome)
            }
            Err(err) => {
                conn.close().await;
                Err(err)
            }
        }
    }
}

/// Parses an upload response body: NUL-padded group, then filename.
fn parse_upload_response(body: &Bytes) -> Result<FileId> {
    if body.len() <= UPLOAD_RESPONSE_MIN_LEN {
        return Err(DfsError::Protocol {
            message: format!(
                "upload response body length {} is not longer than the group field",
                body.len()
            ),
        });
    }

    let group = String::from_utf8_lossy(&body[..GROUP_NAME_MAX_LEN]);
    let filename = String::from_utf8_lossy(&body[GROUP_NAME_MAX_LEN..]);
    FileId::new(
        protocol::trim_padding(&group),
        protocol::trim_padding(&filename),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_body(group: &str, filename: &str) -> Bytes {
        let mut body = vec![0u8; GROUP_NAME_MAX_LEN];
        body[..group.len()].copy_from_slice(group.as_bytes());
        body.extend_from_slice(filename.as_bytes());
        Bytes::from(body)
    }

    #[test]
    fn test_parse_upload_response() {
        let body = upload_body("group1", "M00/00/00/xyz.png");
        let file_id = parse_upload_response(&body).unwrap();
        assert_eq!(file_id.group(), "group1");
        assert_eq!(file_id.remote_filename(), "M00/00/00/xyz.png");
    }

    #[test]
    fn test_parse_upload_response_too_short() {
        let body = Bytes::from(vec![0u8; GROUP_NAME_MAX_LEN]);
        assert!(matches!(
            parse_upload_response(&body),
            Err(DfsError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_extension() {
        let client = StorageClient::new(
            StorageEndpoint {
                host: "127.0.0.1".to_string(),
                port: 23000,
                group: "group1".to_string(),
                store_path_index: 0,
            },
            Duration::from_secs(1),
        );

        // Fails before any socket is opened; the endpoint is fictional.
        let result = client
            .upload(
                UploadSource::bytes(b"data".to_vec()),
                "toolong1",
                UploadMode::Create,
            )
            .await;
        assert!(matches!(result, Err(DfsError::Configuration { .. })));
    }
}
