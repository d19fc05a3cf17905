//! Incremental receiver for length-prefixed response packets.
//!
//! Socket reads arrive with arbitrary boundaries: a partial header, a full
//! header plus part of the body, or several pieces coalesced into one
//! chunk. `PacketReceiver` is a pure state machine fed those chunks; the
//! async read loop that drives it lives in the connection layer, which
//! keeps the framing logic independently testable.

use bytes::Bytes;

use super::{HEADER_BYTE_LEN, PacketHeader};
use crate::{DfsError, Result};

/// Parsing progress reported back to the caller for each fed chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum RecvEvent {
    /// Header parsed and validated. Only emitted in header-only mode.
    Header(PacketHeader),
    /// One raw body chunk, capped at the declared body length. Only in
    /// header-only mode.
    Chunk(Bytes),
    /// The complete buffered body. Terminal event of the default mode.
    Body(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    AwaitingBody,
    StreamingBody,
    Done,
}

/// Incremental parser for one framed response.
///
/// Default mode accumulates the declared body and delivers it as a single
/// `Body` event. Header-only mode emits the header as soon as it parses
/// and then passes body chunks straight through, which lets downloads
/// stream to a sink without buffering the whole file.
#[derive(Debug)]
pub struct PacketReceiver {
    expected_command: u8,
    expected_body_length: Option<u64>,
    header_only: bool,
    state: State,
    header_buf: [u8; HEADER_BYTE_LEN],
    header_filled: usize,
    header: Option<PacketHeader>,
    body: Vec<u8>,
    body_received: u64,
}

impl PacketReceiver {
    /// Creates a receiver that buffers the full body.
    ///
    /// `expected_body_length` of `None` accepts whatever length the header
    /// declares; `Some(n)` makes a differing header a protocol error.
    pub fn new(expected_command: u8, expected_body_length: Option<u64>) -> Self {
        Self {
            expected_command,
            expected_body_length,
            header_only: false,
            state: State::AwaitingHeader,
            header_buf: [0u8; HEADER_BYTE_LEN],
            header_filled: 0,
            header: None,
            body: Vec::new(),
            body_received: 0,
        }
    }

    /// Creates a receiver that emits the header and then raw body chunks.
    pub fn header_only(expected_command: u8) -> Self {
        Self {
            header_only: true,
            ..Self::new(expected_command, None)
        }
    }

    /// True once the declared body has been fully received.
    pub fn is_complete(&self) -> bool {
        self.state == State::Done
    }

    /// Body length declared by the header, once it has been parsed.
    pub fn declared_body_length(&self) -> Option<u64> {
        self.header.map(|h| h.body_length)
    }

    /// Consumes one chunk of inbound data, advancing the state machine.
    ///
    /// Returns the events produced by this chunk, possibly none (header
    /// still incomplete) or several (header plus first body chunk arriving
    /// coalesced). A parse failure is terminal; the caller must stop
    /// feeding and tear the connection down.
    ///
    /// # Errors
    /// - `DfsError::Protocol` - Command or body length mismatch
    /// - `DfsError::Server` - Non-zero status byte, value kept as the code
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<RecvEvent>> {
        let mut events = Vec::new();

        match self.state {
            State::AwaitingHeader => {
                let need = HEADER_BYTE_LEN - self.header_filled;
                if data.len() < need {
                    self.header_buf[self.header_filled..self.header_filled + data.len()]
                        .copy_from_slice(data);
                    self.header_filled += data.len();
                    return Ok(events);
                }

                self.header_buf[self.header_filled..].copy_from_slice(&data[..need]);
                self.header_filled = HEADER_BYTE_LEN;
                let header = PacketHeader::parse(&self.header_buf);
                header.validate(self.expected_command, self.expected_body_length)?;
                tracing::debug!(
                    command = header.command,
                    body_length = header.body_length,
                    "received packet header"
                );
                self.header = Some(header);
                let rest = &data[need..];

                if self.header_only {
                    events.push(RecvEvent::Header(header));
                    if header.body_length == 0 {
                        self.state = State::Done;
                    } else {
                        self.state = State::StreamingBody;
                        if !rest.is_empty() {
                            self.consume_stream(rest, &mut events);
                        }
                    }
                } else if header.body_length == 0 {
                    self.state = State::Done;
                    events.push(RecvEvent::Body(Bytes::new()));
                } else {
                    self.state = State::AwaitingBody;
                    self.body = Vec::with_capacity(header.body_length as usize);
                    if !rest.is_empty() {
                        self.consume_buffered(rest, &mut events);
                    }
                }
            }
            State::AwaitingBody => self.consume_buffered(data, &mut events),
            State::StreamingBody => self.consume_stream(data, &mut events),
            // Data after completion belongs to no packet; the connection is
            // about to be closed, so it is dropped.
            State::Done => {}
        }

        Ok(events)
    }

    fn consume_buffered(&mut self, data: &[u8], events: &mut Vec<RecvEvent>) {
        let declared = self.header.map(|h| h.body_length).unwrap_or(0) as usize;
        let take = data.len().min(declared - self.body.len());
        self.body.extend_from_slice(&data[..take]);
        if self.body.len() >= declared {
            self.state = State::Done;
            events.push(RecvEvent::Body(Bytes::from(std::mem::take(&mut self.body))));
        }
    }

    fn consume_stream(&mut self, data: &[u8], events: &mut Vec<RecvEvent>) {
        let declared = self.header.map(|h| h.body_length).unwrap_or(0);
        // Bytes past the declared length belong to no packet; truncate so
        // forwarded chunks always total exactly the declared body length.
        let take = (data.len() as u64).min(declared - self.body_received) as usize;
        if take > 0 {
            self.body_received += take as u64;
            events.push(RecvEvent::Chunk(Bytes::copy_from_slice(&data[..take])));
        }
        if self.body_received >= declared {
            self.state = State::Done;
        }
    }
}
