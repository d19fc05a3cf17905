//! Wire protocol codec for the tracker/storage binary protocol.
//!
//! Every frame starts with a fixed 10-byte header (8-byte big-endian body
//! length, 1 command byte, 1 status byte) followed by a command-specific
//! body. Fixed-width string fields are NUL-padded; all multi-byte integers
//! are big-endian. The constants below are wire-format invariants and must
//! match the server byte-for-byte.

pub mod codec;
pub mod header;
pub mod receiver;

// Re-export public API
pub use codec::{
    MetaData, number_to_bytes, pack_file_id, pack_metadata, parse_metadata, read_u64, trim_padding,
    write_padded,
};
pub use header::{PacketHeader, pack_header};
pub use receiver::{PacketReceiver, RecvEvent};

/// Width of the body-length field at the start of every header.
pub const PKG_LEN_SIZE: usize = 8;

/// Total header size: body length + command byte + status byte.
pub const HEADER_BYTE_LEN: usize = PKG_LEN_SIZE + 2;

/// Fixed width of a group name field.
pub const GROUP_NAME_MAX_LEN: usize = 16;

/// Fixed width of an IP address field.
pub const IPADDR_SIZE: usize = 16;

/// Fixed width of a domain name field in storage stat records.
pub const DOMAIN_NAME_MAX_SIZE: usize = 128;

/// Fixed width of a server version field.
pub const VERSION_SIZE: usize = 6;

/// Fixed width of a storage node id field.
pub const STORAGE_ID_MAX_SIZE: usize = 16;

/// Maximum byte length of a file extension, without the leading dot.
pub const FILE_EXT_NAME_MAX_LEN: usize = 6;

/// Separator between metadata records.
pub const RECORD_SEPARATOR: char = '\u{1}';

/// Separator between the key and value of one metadata record.
pub const FIELD_SEPARATOR: char = '\u{2}';

/// Status byte of a successful response.
pub const STATUS_SUCCESS: u8 = 0;

// Command codes shared by both server roles.
pub const CMD_QUIT: u8 = 82;
pub const CMD_RESP: u8 = 100;
pub const CMD_ACTIVE_TEST: u8 = 111;

// Tracker commands.
pub const TRACKER_CMD_LIST_GROUPS: u8 = 91;
pub const TRACKER_CMD_LIST_STORAGES: u8 = 92;
pub const TRACKER_CMD_QUERY_STORE_WITHOUT_GROUP: u8 = 101;
pub const TRACKER_CMD_QUERY_FETCH: u8 = 102;
pub const TRACKER_CMD_QUERY_UPDATE: u8 = 103;
pub const TRACKER_CMD_QUERY_STORE_WITH_GROUP: u8 = 104;

// Storage commands.
pub const STORAGE_CMD_UPLOAD_FILE: u8 = 11;
pub const STORAGE_CMD_DELETE_FILE: u8 = 12;
pub const STORAGE_CMD_SET_METADATA: u8 = 13;
pub const STORAGE_CMD_DOWNLOAD_FILE: u8 = 14;
pub const STORAGE_CMD_GET_METADATA: u8 = 15;
pub const STORAGE_CMD_QUERY_FILE_INFO: u8 = 22;
pub const STORAGE_CMD_UPLOAD_APPENDER_FILE: u8 = 23;
pub const STORAGE_CMD_APPEND_FILE: u8 = 24;
pub const STORAGE_CMD_MODIFY_FILE: u8 = 34;
pub const STORAGE_CMD_TRUNCATE_FILE: u8 = 36;

/// Body length of a fetch/update storage query response:
/// group name + IP address (one byte shorter than the fixed field) + port.
pub const TRACKER_QUERY_FETCH_BODY_LEN: usize = GROUP_NAME_MAX_LEN + IPADDR_SIZE - 1 + PKG_LEN_SIZE;

/// Body length of a store storage query response: fetch layout plus one
/// trailing store-path index byte.
pub const TRACKER_QUERY_STORE_BODY_LEN: usize = TRACKER_QUERY_FETCH_BODY_LEN + 1;
