//! Administrative record types returned by tracker list queries.
//!
//! Group and storage stat responses are sequences of fixed-size records
//! with NUL-padded string fields and big-endian 8-byte counters; a body
//! whose length is not a multiple of the record size is a protocol error.

use chrono::{DateTime, Utc};

use crate::protocol::{
    self, DOMAIN_NAME_MAX_SIZE, GROUP_NAME_MAX_LEN, IPADDR_SIZE, PKG_LEN_SIZE,
    STORAGE_ID_MAX_SIZE, VERSION_SIZE,
};

/// Size of one group stat record: 17-byte name field plus 11 counters.
pub const GROUP_STAT_RECORD_LEN: usize = GROUP_NAME_MAX_LEN + 1 + 11 * PKG_LEN_SIZE;

/// Size of one storage stat record.
pub const STORAGE_STAT_RECORD_LEN: usize = 600;

/// Replication/availability state of one storage node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    Init,
    WaitSync,
    Syncing,
    IpChanged,
    Deleted,
    Offline,
    Online,
    Active,
    None,
}

impl StorageStatus {
    /// Decodes the wire status byte; unknown values map to `None` (99).
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::Init,
            1 => Self::WaitSync,
            2 => Self::Syncing,
            3 => Self::IpChanged,
            4 => Self::Deleted,
            5 => Self::Offline,
            6 => Self::Online,
            7 => Self::Active,
            _ => Self::None,
        }
    }
}

/// Total/success pair of one lifetime operation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counter {
    pub total: u64,
    pub success: u64,
}

/// Capacity and usage counters of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStat {
    pub name: String,
    pub total_mb: u64,
    pub free_mb: u64,
    pub trunk_free_mb: u64,
    pub storage_count: u64,
    pub storage_port: u64,
    pub storage_http_port: u64,
    pub active_count: u64,
    pub current_write_server: u64,
    pub store_path_count: u64,
    pub subdir_count_per_path: u64,
    pub current_trunk_file_id: u64,
}

/// Identity, status, and lifetime counters of one storage node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStat {
    pub status: StorageStatus,
    pub id: String,
    pub ip_addr: String,
    pub domain_name: String,
    pub src_ip_addr: String,
    pub version: String,
    pub join_time: DateTime<Utc>,
    pub up_time: DateTime<Utc>,
    pub total_mb: u64,
    pub free_mb: u64,
    pub upload_priority: u64,
    pub store_path_count: u64,
    pub subdir_count_per_path: u64,
    pub current_write_path: u64,
    pub storage_port: u64,
    pub storage_http_port: u64,
    pub upload: Counter,
    pub append: Counter,
    pub modify: Counter,
    pub truncate: Counter,
    pub set_metadata: Counter,
    pub delete: Counter,
    pub download: Counter,
    pub get_metadata: Counter,
    pub create_link: Counter,
    pub delete_link: Counter,
    pub upload_bytes: Counter,
    pub append_bytes: Counter,
    pub modify_bytes: Counter,
    pub download_bytes: Counter,
    pub sync_in_bytes: Counter,
    pub sync_out_bytes: Counter,
    pub file_open: Counter,
    pub file_read: Counter,
    pub file_write: Counter,
    pub last_source_update: DateTime<Utc>,
    pub last_sync_update: DateTime<Utc>,
    pub last_synced_timestamp: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub trunk_server: bool,
}

/// Sequential reader over one fixed-size record.
pub(crate) struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn read_u8(&mut self) -> u8 {
        let value = self.buf[self.pos];
        self.pos += 1;
        value
    }

    pub(crate) fn read_u64(&mut self) -> u64 {
        let value = protocol::read_u64(self.buf, self.pos);
        self.pos += PKG_LEN_SIZE;
        value
    }

    pub(crate) fn read_str(&mut self, width: usize) -> String {
        let raw = String::from_utf8_lossy(&self.buf[self.pos..self.pos + width]);
        self.pos += width;
        protocol::trim_padding(&raw).to_string()
    }

    fn read_counter(&mut self) -> Counter {
        Counter {
            total: self.read_u64(),
            success: self.read_u64(),
        }
    }

    fn read_timestamp(&mut self) -> DateTime<Utc> {
        epoch_seconds(self.read_u64())
    }
}

fn epoch_seconds(secs: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

impl GroupStat {
    /// Decodes one record of exactly `GROUP_STAT_RECORD_LEN` bytes.
    pub(crate) fn parse_record(record: &[u8]) -> Self {
        let mut r = RecordReader::new(record);
        Self {
            name: r.read_str(GROUP_NAME_MAX_LEN + 1),
            total_mb: r.read_u64(),
            free_mb: r.read_u64(),
            trunk_free_mb: r.read_u64(),
            storage_count: r.read_u64(),
            storage_port: r.read_u64(),
            storage_http_port: r.read_u64(),
            active_count: r.read_u64(),
            current_write_server: r.read_u64(),
            store_path_count: r.read_u64(),
            subdir_count_per_path: r.read_u64(),
            current_trunk_file_id: r.read_u64(),
        }
    }
}

impl StorageStat {
    /// Decodes one record of exactly `STORAGE_STAT_RECORD_LEN` bytes.
    pub(crate) fn parse_record(record: &[u8]) -> Self {
        let mut r = RecordReader::new(record);
        Self {
            status: StorageStatus::from_byte(r.read_u8()),
            id: r.read_str(STORAGE_ID_MAX_SIZE),
            ip_addr: r.read_str(IPADDR_SIZE),
            domain_name: r.read_str(DOMAIN_NAME_MAX_SIZE),
            src_ip_addr: r.read_str(IPADDR_SIZE),
            version: r.read_str(VERSION_SIZE),
            join_time: r.read_timestamp(),
            up_time: r.read_timestamp(),
            total_mb: r.read_u64(),
            free_mb: r.read_u64(),
            upload_priority: r.read_u64(),
            store_path_count: r.read_u64(),
            subdir_count_per_path: r.read_u64(),
            current_write_path: r.read_u64(),
            storage_port: r.read_u64(),
            storage_http_port: r.read_u64(),
            upload: r.read_counter(),
            append: r.read_counter(),
            modify: r.read_counter(),
            truncate: r.read_counter(),
            set_metadata: r.read_counter(),
            delete: r.read_counter(),
            download: r.read_counter(),
            get_metadata: r.read_counter(),
            create_link: r.read_counter(),
            delete_link: r.read_counter(),
            upload_bytes: r.read_counter(),
            append_bytes: r.read_counter(),
            modify_bytes: r.read_counter(),
            download_bytes: r.read_counter(),
            sync_in_bytes: r.read_counter(),
            sync_out_bytes: r.read_counter(),
            file_open: r.read_counter(),
            file_read: r.read_counter(),
            file_write: r.read_counter(),
            last_source_update: r.read_timestamp(),
            last_sync_update: r.read_timestamp(),
            last_synced_timestamp: r.read_timestamp(),
            last_heartbeat: r.read_timestamp(),
            trunk_server: r.read_u8() != 0,
        }
    }
}
