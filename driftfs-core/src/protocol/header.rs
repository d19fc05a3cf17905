//! Fixed-size packet header encoding and validation.

use super::{HEADER_BYTE_LEN, PKG_LEN_SIZE, STATUS_SUCCESS, codec};
use crate::{DfsError, Result};

/// Parsed 10-byte packet header.
///
/// Status 0 means success; any other value is an application-level error
/// reported by the server and carries that value as the error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub body_length: u64,
    pub command: u8,
    pub status: u8,
}

/// Encodes a packet header: 8 big-endian length bytes, command, status.
pub fn pack_header(command: u8, body_length: u64, status: u8) -> [u8; HEADER_BYTE_LEN] {
    let mut buf = [0u8; HEADER_BYTE_LEN];
    buf[..PKG_LEN_SIZE].copy_from_slice(&body_length.to_be_bytes());
    buf[PKG_LEN_SIZE] = command;
    buf[PKG_LEN_SIZE + 1] = status;
    buf
}

impl PacketHeader {
    /// Decodes a header from exactly `HEADER_BYTE_LEN` bytes.
    pub fn parse(buf: &[u8; HEADER_BYTE_LEN]) -> Self {
        Self {
            body_length: codec::read_u64(buf, 0),
            command: buf[PKG_LEN_SIZE],
            status: buf[PKG_LEN_SIZE + 1],
        }
    }

    /// Validates a received header against the caller's expectations.
    ///
    /// # Errors
    /// - `DfsError::Protocol` - Command or body length differs from expected
    /// - `DfsError::Server` - Non-zero status byte, preserved as the code
    pub fn validate(&self, expected_command: u8, expected_body_length: Option<u64>) -> Result<()> {
        if self.command != expected_command {
            return Err(DfsError::Protocol {
                message: format!(
                    "received command {} is not the expected command {expected_command}",
                    self.command
                ),
            });
        }

        if self.status != STATUS_SUCCESS {
            return Err(DfsError::Server { code: self.status });
        }

        if let Some(expected) = expected_body_length
            && self.body_length != expected
        {
            return Err(DfsError::Protocol {
                message: format!(
                    "received body length {} is not the expected length {expected}",
                    self.body_length
                ),
            });
        }

        Ok(())
    }
}
