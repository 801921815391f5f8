// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-tracing is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-tracing.  If
// not, see <http://www.gnu.org/licenses/>.

//! GELF UDP chunking.
//!
//! A GELF payload that fits in one datagram is sent as-is. Anything larger is split into at most
//! [`MAX_CHUNKS`] chunks, each framed like so:
//!
//! ```text
//! +------+------+------------------------+-----+-------+-----------------+
//! | 0x1e | 0x0f |  message ID (8 bytes)  | seq | total | payload slice   |
//! +------+------+------------------------+-----+-------+-----------------+
//! ```
//!
//! All chunks of one message share the message ID & total; `seq` runs from zero to `total - 1`.
//! The receiver reassembles; nothing here buffers or retransmits.

use crate::{
    error::{Error, Result},
    message_id::{MessageId, MessageIdGenerator},
};

use backtrace::Backtrace;
use bytes::{BufMut, Bytes, BytesMut};

use std::sync::Arc;

/// Marks a datagram as a GELF chunk.
pub const MAGIC: [u8; 2] = [0x1e, 0x0f];
/// Magic, message ID, sequence number & total.
pub const HEADER_SIZE: usize = 12;
/// The most chunks a Graylog input will reassemble.
pub const MAX_CHUNKS: usize = 128;
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 8192;
/// The smallest datagram that can carry a header & at least one byte of payload.
pub const MIN_DATAGRAM_SIZE: usize = HEADER_SIZE + 1;
/// The largest UDP payload IPv4 can carry (65535 less the IP & UDP headers).
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// One framed piece of a chunked message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub message_id: MessageId,
    pub sequence: u8,
    pub total: u8,
    pub payload: Bytes,
}

impl Chunk {
    /// Lay this chunk out as a datagram.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_slice(&MAGIC);
        buf.put_slice(&self.message_id);
        buf.put_u8(self.sequence);
        buf.put_u8(self.total);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a datagram as a chunk; `None` if it doesn't carry a chunk header.
    pub fn decode(datagram: &[u8]) -> Option<Chunk> {
        if datagram.len() < HEADER_SIZE || datagram[..2] != MAGIC {
            return None;
        }
        let mut message_id = [0u8; 8];
        message_id.copy_from_slice(&datagram[2..10]);
        Some(Chunk {
            message_id,
            sequence: datagram[10],
            total: datagram[11],
            payload: Bytes::copy_from_slice(&datagram[HEADER_SIZE..]),
        })
    }
}

/// What goes out on the wire for one GELF message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Datagrams {
    /// The payload fit; no chunk header
    Single(Bytes),
    /// In ascending sequence order
    Chunked(Vec<Chunk>),
}

impl Datagrams {
    pub fn len(&self) -> usize {
        match self {
            Datagrams::Single(_) => 1,
            Datagrams::Chunked(chunks) => chunks.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The datagrams to send, in the order they're to be sent.
    pub fn encode(&self) -> Vec<Bytes> {
        match self {
            Datagrams::Single(payload) => vec![payload.clone()],
            Datagrams::Chunked(chunks) => chunks.iter().map(Chunk::encode).collect(),
        }
    }
}

/// Refuse datagram sizes that can't carry a chunk, or that no UDP socket will send.
pub(crate) fn check_datagram_size(max_datagram_size: usize) -> Result<()> {
    if !(MIN_DATAGRAM_SIZE..=MAX_DATAGRAM_SIZE).contains(&max_datagram_size) {
        return Err(Error::bad_config(format!(
            "the maximum datagram size must be between {} & {} bytes (got {})",
            MIN_DATAGRAM_SIZE, MAX_DATAGRAM_SIZE, max_datagram_size
        )));
    }
    Ok(())
}

/// The number of chunks `len` bytes need when each carries `chunk_payload_size`.
fn chunk_count(len: usize, chunk_payload_size: usize) -> usize {
    (len + chunk_payload_size - 1) / chunk_payload_size
}

/// Frame `payload` for datagrams of at most `max_datagram_size` bytes, tagging any chunks with `id`.
///
/// A payload of no more than `max_datagram_size` bytes is returned whole. Otherwise it's cut into
/// slices of `max_datagram_size - HEADER_SIZE` bytes; if that takes more than [`MAX_CHUNKS`] the
/// message is refused with [`Error::MessageTooLarge`].
pub fn frame(payload: Bytes, max_datagram_size: usize, id: MessageId) -> Result<Datagrams> {
    check_datagram_size(max_datagram_size)?;
    if payload.len() <= max_datagram_size {
        return Ok(Datagrams::Single(payload));
    }
    let chunk_payload_size = max_datagram_size - HEADER_SIZE;
    let total = check_chunk_count(payload.len(), chunk_payload_size)?;
    Ok(Datagrams::Chunked(
        (0..total)
            .map(|i| {
                let start = i * chunk_payload_size;
                let end = std::cmp::min(start + chunk_payload_size, payload.len());
                Chunk {
                    message_id: id,
                    sequence: i as u8,
                    total: total as u8,
                    payload: payload.slice(start..end),
                }
            })
            .collect(),
    ))
}

fn check_chunk_count(len: usize, chunk_payload_size: usize) -> Result<usize> {
    let total = chunk_count(len, chunk_payload_size);
    if total > MAX_CHUNKS {
        return Err(Error::MessageTooLarge {
            size: len,
            chunks: total,
            back: Backtrace::new(),
        });
    }
    Ok(total)
}

/// Splits GELF payloads into datagrams, drawing a fresh message ID for each chunked message.
#[derive(Clone)]
pub struct ChunkEncoder {
    max_datagram_size: usize,
    ids: Arc<dyn MessageIdGenerator>,
}

impl ChunkEncoder {
    pub fn new(max_datagram_size: usize, ids: Arc<dyn MessageIdGenerator>) -> Result<ChunkEncoder> {
        check_datagram_size(max_datagram_size)?;
        Ok(ChunkEncoder {
            max_datagram_size,
            ids,
        })
    }
    pub fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }
    pub fn chunk_payload_size(&self) -> usize {
        self.max_datagram_size - HEADER_SIZE
    }
    /// Frame `payload`. Message IDs are only drawn for payloads that actually get chunked.
    pub fn to_chunks(&self, payload: impl Into<Bytes>) -> Result<Datagrams> {
        let payload = payload.into();
        if payload.len() <= self.max_datagram_size {
            return Ok(Datagrams::Single(payload));
        }
        // Refuse before drawing an ID for a message that will never be sent
        check_chunk_count(payload.len(), self.chunk_payload_size())?;
        frame(payload, self.max_datagram_size, self.ids.next_id())
    }
}

impl std::fmt::Debug for ChunkEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkEncoder")
            .field("max_datagram_size", &self.max_datagram_size)
            .finish()
    }
}
