//! Encoding helpers for protocol primitives: fixed-width integers,
//! NUL-padded string fields, file-id packets, and metadata serialization.

use std::collections::BTreeMap;

use bytes::BufMut;

use super::{FIELD_SEPARATOR, GROUP_NAME_MAX_LEN, PKG_LEN_SIZE, RECORD_SEPARATOR, header};

/// Ordered key/value metadata attached to a stored file.
pub type MetaData = BTreeMap<String, String>;

/// Encodes `n` as `width` big-endian bytes.
///
/// Values shorter than the field are left-padded with zero bytes. Values
/// whose representation exceeds the field keep only the low-order `width`
/// bytes; the protocol's length fields are all 8 bytes wide, so the
/// truncation case is only reachable for narrower scratch fields.
pub fn number_to_bytes(n: u64, width: usize) -> Vec<u8> {
    let be = n.to_be_bytes();
    let mut buf = Vec::with_capacity(width);
    if width >= be.len() {
        buf.resize(width - be.len(), 0);
        buf.extend_from_slice(&be);
    } else {
        buf.extend_from_slice(&be[be.len() - width..]);
    }
    buf
}

/// Reads an 8-byte big-endian unsigned integer starting at `offset`.
pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut be = [0u8; PKG_LEN_SIZE];
    be.copy_from_slice(&buf[offset..offset + PKG_LEN_SIZE]);
    u64::from_be_bytes(be)
}

/// Writes a string into a fixed-width field, leaving the tail NUL-padded.
///
/// The destination slice is the full field; callers guarantee the string
/// fits. Bytes past the string keep their zero fill.
pub fn write_padded(dst: &mut [u8], s: &str) {
    dst[..s.len()].copy_from_slice(s.as_bytes());
}

/// Strips NUL padding and surrounding whitespace from a decoded field.
pub fn trim_padding(s: &str) -> &str {
    s.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// Builds a complete header+body packet addressing one file.
///
/// Body layout: group name NUL-padded to its fixed 16-byte field, then the
/// raw filename bytes. Used by download, delete, metadata, and file-info
/// requests as well as tracker fetch/update queries.
pub fn pack_file_id(command: u8, group: &str, filename: &str) -> Vec<u8> {
    let body_length = GROUP_NAME_MAX_LEN + filename.len();
    let mut packet = Vec::with_capacity(super::HEADER_BYTE_LEN + body_length);
    packet.put_slice(&header::pack_header(command, body_length as u64, 0));

    let mut group_field = [0u8; GROUP_NAME_MAX_LEN];
    write_padded(&mut group_field, group);
    packet.put_slice(&group_field);
    packet.put_slice(filename.as_bytes());
    packet
}

/// Serializes metadata: `key \x02 value` records joined by `\x01`.
///
/// No trailing separator; an empty map yields an empty string. Keys and
/// values must not contain the separator bytes or NUL.
pub fn pack_metadata(meta: &MetaData) -> String {
    let mut result = String::new();
    for (key, value) in meta {
        if !result.is_empty() {
            result.push(RECORD_SEPARATOR);
        }
        result.push_str(key);
        result.push(FIELD_SEPARATOR);
        result.push_str(value);
    }
    result
}

/// Parses serialized metadata back into a map.
///
/// NUL padding and whitespace are trimmed from keys and values; records
/// without a field separator decode as a key with an empty value.
pub fn parse_metadata(raw: &str) -> MetaData {
    let mut result = MetaData::new();
    if raw.is_empty() {
        return result;
    }

    for record in raw.split(RECORD_SEPARATOR) {
        let (key, value) = record
            .split_once(FIELD_SEPARATOR)
            .unwrap_or((record, ""));
        result.insert(
            trim_padding(key).to_string(),
            trim_padding(value).to_string(),
        );
    }
    result
}
