//! Types describing storage endpoints and operation parameters.

use chrono::{DateTime, Utc};

use crate::FileId;
use crate::protocol::{self, GROUP_NAME_MAX_LEN, IPADDR_SIZE, PKG_LEN_SIZE};

/// A storage server resolved through a tracker query.
///
/// The store-path index is only meaningful for endpoints learned from an
/// upload-target query; it selects the server-side disk path and is echoed
/// back in upload request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEndpoint {
    pub host: String,
    pub port: u16,
    pub group: String,
    pub store_path_index: u8,
}

/// How an upload request is shaped on the wire.
///
/// Append and modify address a previously created appendable file; only
/// its filename travels on the wire, the group being implied by the
/// endpoint the tracker resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Create a new immutable file.
    #[default]
    Create,
    /// Create a new file that permits later append/modify/truncate.
    CreateAppendable,
    /// Append to the end of an appendable file.
    Append { file_id: FileId },
    /// Overwrite a byte range of an appendable file at the given offset.
    Modify { file_id: FileId, offset: u64 },
}

/// Server behavior when setting metadata on a file that already has some.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMetadataFlag {
    /// Replace all existing metadata.
    #[default]
    Overwrite,
    /// Insert missing keys, update existing ones.
    Merge,
}

impl SetMetadataFlag {
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Self::Overwrite => b'O',
            Self::Merge => b'M',
        }
    }
}

/// Byte range of a download request.
///
/// A length of zero means "from the offset to the end of the file".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadRange {
    pub offset: u64,
    pub length: u64,
}

impl DownloadRange {
    /// Range covering the whole file.
    pub fn full() -> Self {
        Self::default()
    }

    /// Range starting at `offset` running to the end of the file.
    pub fn from_offset(offset: u64) -> Self {
        Self { offset, length: 0 }
    }

    /// Range of `length` bytes starting at `offset`.
    pub fn slice(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }
}

/// Attributes of a stored file reported by the file-info query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// File size in bytes
    pub size: u64,
    /// Creation time, converted from protocol epoch seconds
    pub created: DateTime<Utc>,
    /// CRC32 signature of the content
    pub crc32: u32,
    /// IP address of the storage server the file was first uploaded to
    pub source_addr: String,
}

/// Body length of a file-info response: size, timestamp, crc32, source ip.
pub(crate) const FILE_INFO_BODY_LEN: usize = PKG_LEN_SIZE * 3 + IPADDR_SIZE;

impl FileInfo {
    /// Decodes a file-info response body.
    pub(crate) fn parse(body: &[u8]) -> Self {
        let timestamp = protocol::read_u64(body, PKG_LEN_SIZE);
        let crc32 = protocol::read_u64(body, PKG_LEN_SIZE * 2);
        let addr = String::from_utf8_lossy(&body[PKG_LEN_SIZE * 3..FILE_INFO_BODY_LEN]);
        Self {
            size: protocol::read_u64(body, 0),
            created: DateTime::from_timestamp(timestamp as i64, 0).unwrap_or(DateTime::UNIX_EPOCH),
            crc32: (crc32 & 0xffff_ffff) as u32,
            source_addr: protocol::trim_padding(&addr).to_string(),
        }
    }
}

/// Expected body length of an upload response lower bound: the fixed group
/// field must be followed by at least one filename byte.
pub(crate) const UPLOAD_RESPONSE_MIN_LEN: usize = GROUP_NAME_MAX_LEN;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::number_to_bytes;

    #[test]
    fn test_metadata_flag_bytes() {
        assert_eq!(SetMetadataFlag::Overwrite.as_byte(), b'O');
        assert_eq!(SetMetadataFlag::Merge.as_byte(), b'M');
        assert_eq!(SetMetadataFlag::default(), SetMetadataFlag::Overwrite);
    }

    #[test]
    fn test_file_info_parse() {
        let mut body = Vec::new();
        body.extend_from_slice(&number_to_bytes(4096, 8));
        body.extend_from_slice(&number_to_bytes(1_441_000_000, 8));
        body.extend_from_slice(&number_to_bytes(0xdead_beef, 8));
        let mut addr = [0u8; IPADDR_SIZE];
        addr[..11].copy_from_slice(b"192.168.1.7");
        body.extend_from_slice(&addr);

        let info = FileInfo::parse(&body);
        assert_eq!(info.size, 4096);
        assert_eq!(info.created.timestamp(), 1_441_000_000);
        assert_eq!(info.crc32, 0xdead_beef);
        assert_eq!(info.source_addr, "192.168.1.7");
    }

    #[test]
    fn test_download_range_constructors() {
        assert_eq!(DownloadRange::full(), DownloadRange::default());
        let range = DownloadRange::slice(100, 50);
        assert_eq!(range.offset, 100);
        assert_eq!(range.length, 50);
    }
}
