// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Messages and the chunk body codec.
//!
//! ```text
//! chunk   := start_ts:u64 | end_ts:u64 | count:u32 | message * count
//! message := stream_id:u32 | seq:u64 | ts:u64 | len:u32 | bytes
//! ```

use std::collections::BTreeSet;

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::{Result, StreamError};
use crate::io::constants::{CHUNK_HEADER_LEN, MESSAGE_HEADER_LEN};

/// A timestamped payload of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Stream the message belongs to
    pub stream_id: u32,
    /// Position in the writer's global save order
    pub seq: u64,
    /// Timestamp in nanoseconds
    pub ts: u64,
    /// Opaque payload
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(stream_id: u32, ts: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            stream_id,
            seq: 0,
            ts,
            data: data.into(),
        }
    }

    /// Bytes this message occupies inside a chunk.
    pub fn encoded_len(&self) -> usize {
        MESSAGE_HEADER_LEN + self.data.len()
    }
}

/// Decoded chunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBody {
    pub start_ts: u64,
    pub end_ts: u64,
    pub messages: Vec<Message>,
}

impl ChunkBody {
    /// Decode a chunk record body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(body);
        let start_ts = cursor.read_u64()?;
        let end_ts = cursor.read_u64()?;
        let count = cursor.read_u32()? as usize;
        let mut messages = Vec::with_capacity(count.min(cursor.remaining() / MESSAGE_HEADER_LEN));
        for _ in 0..count {
            let stream_id = cursor.read_u32()?;
            let seq = cursor.read_u64()?;
            let ts = cursor.read_u64()?;
            let len = cursor.read_u32()? as usize;
            let data = cursor.read_raw(len)?.to_vec();
            messages.push(Message {
                stream_id,
                seq,
                ts,
                data,
            });
        }
        if !cursor.is_empty() {
            return Err(StreamError::decode(
                "chunk",
                format!("{} trailing bytes after {count} messages", cursor.remaining()),
            ));
        }
        Ok(Self {
            start_ts,
            end_ts,
            messages,
        })
    }
}

/// Accumulates messages into a pending chunk.
#[derive(Debug, Default)]
pub struct ChunkBuilder {
    buf: ByteBuffer,
    start_ts: u64,
    end_ts: u64,
    count: u32,
    stream_ids: BTreeSet<u32>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message.
    pub fn push(&mut self, stream_id: u32, seq: u64, ts: u64, data: &[u8]) {
        if self.count == 0 {
            self.start_ts = ts;
            self.end_ts = ts;
        } else {
            self.start_ts = self.start_ts.min(ts);
            self.end_ts = self.end_ts.max(ts);
        }
        self.buf.put_u32(stream_id);
        self.buf.put_u64(seq);
        self.buf.put_u64(ts);
        self.buf.put_bytes(data);
        self.count += 1;
        self.stream_ids.insert(stream_id);
    }

    /// Encoded message bytes accumulated so far.
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn message_count(&self) -> u32 {
        self.count
    }

    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    pub fn end_ts(&self) -> u64 {
        self.end_ts
    }

    /// Streams with at least one message in this chunk, ascending.
    pub fn stream_ids(&self) -> Vec<u32> {
        self.stream_ids.iter().copied().collect()
    }

    /// Seal the pending chunk and reset the builder.
    pub fn finish(&mut self) -> SealedChunk {
        let taken = std::mem::take(self);
        let mut body = ByteBuffer::with_capacity(CHUNK_HEADER_LEN + taken.buf.len());
        body.put_u64(taken.start_ts);
        body.put_u64(taken.end_ts);
        body.put_u32(taken.count);
        body.put_raw(taken.buf.as_slice());
        SealedChunk {
            body: body.into_vec(),
            start_ts: taken.start_ts,
            end_ts: taken.end_ts,
            message_count: taken.count,
            stream_ids: taken.stream_ids.into_iter().collect(),
        }
    }
}

/// Encoded chunk body ready to be framed and written.
#[derive(Debug, Clone)]
pub struct SealedChunk {
    pub body: Vec<u8>,
    pub start_ts: u64,
    pub end_ts: u64,
    pub message_count: u32,
    pub stream_ids: Vec<u32>,
}
