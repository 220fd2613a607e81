// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Chunk layout policies and the chunk index.
//!
//! - [`ChunksLayout::Standard`]: one shared pending chunk; the chunk index
//!   is written once, in the footer. A file that was never closed has no
//!   index and cannot be opened.
//! - [`ChunksLayout::Streaming`]: one pending chunk per stream; every
//!   flushed chunk is immediately followed by its own index record, so a
//!   partially written file can be recovered up to the last complete chunk.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::{Result, StreamError};
use crate::io::chunk::{ChunkBuilder, SealedChunk};

/// Chunk layout policy, fixed at writer construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunksLayout {
    /// Index written once at close
    Standard,
    /// Index entry written after every chunk
    #[default]
    Streaming,
}

impl ChunksLayout {
    /// Persisted layout tag.
    pub fn as_u8(self) -> u8 {
        match self {
            ChunksLayout::Standard => 0,
            ChunksLayout::Streaming => 1,
        }
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ChunksLayout::Standard),
            1 => Some(ChunksLayout::Streaming),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChunksLayout::Standard => "standard",
            ChunksLayout::Streaming => "streaming",
        }
    }

    pub fn is_streaming(self) -> bool {
        matches!(self, ChunksLayout::Streaming)
    }
}

impl fmt::Display for ChunksLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunksLayout {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "std" => Ok(ChunksLayout::Standard),
            "streaming" | "stream" => Ok(ChunksLayout::Streaming),
            _ => Err(StreamError::usage(
                "parse layout",
                format!("unknown layout '{s}', expected 'standard' or 'streaming'"),
            )),
        }
    }
}

/// Index entry describing one chunk record.
///
/// ```text
/// offset:u64 | length:u64 | start_ts:u64 | end_ts:u64 |
/// message_count:u32 | n:u16 | stream_id:u32 * n
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Offset of the chunk record from file start
    pub offset: u64,
    /// Length of the whole chunk record, framing included
    pub length: u64,
    pub start_ts: u64,
    pub end_ts: u64,
    pub message_count: u32,
    /// Streams present in the chunk, ascending
    pub stream_ids: Vec<u32>,
}

impl ChunkInfo {
    /// Whether `[start_ts, end_ts]` intersects `[start, end]`.
    pub fn intersects(&self, start: u64, end: u64) -> bool {
        self.start_ts <= end && self.end_ts >= start
    }

    pub fn has_stream(&self, stream_id: u32) -> bool {
        self.stream_ids.binary_search(&stream_id).is_ok()
    }

    /// End offset of the chunk record.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn encode(&self, buf: &mut ByteBuffer) {
        buf.put_u64(self.offset);
        buf.put_u64(self.length);
        buf.put_u64(self.start_ts);
        buf.put_u64(self.end_ts);
        buf.put_u32(self.message_count);
        buf.put_u16(self.stream_ids.len() as u16);
        for id in &self.stream_ids {
            buf.put_u32(*id);
        }
    }

    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let offset = cursor.read_u64()?;
        let length = cursor.read_u64()?;
        let start_ts = cursor.read_u64()?;
        let end_ts = cursor.read_u64()?;
        let message_count = cursor.read_u32()?;
        let n = cursor.read_u16()?;
        let mut stream_ids = Vec::with_capacity(n as usize);
        for _ in 0..n {
            stream_ids.push(cursor.read_u32()?);
        }
        stream_ids.sort_unstable();
        Ok(Self {
            offset,
            length,
            start_ts,
            end_ts,
            message_count,
            stream_ids,
        })
    }
}

/// Encode a chunk index table: `count:u32 | entry * count`.
pub fn encode_index(chunks: &[ChunkInfo]) -> Vec<u8> {
    let mut buf = ByteBuffer::with_capacity(4 + chunks.len() * 48);
    buf.put_u32(chunks.len() as u32);
    for chunk in chunks {
        chunk.encode(&mut buf);
    }
    buf.into_vec()
}

/// Decode a chunk index table.
pub fn decode_index(body: &[u8]) -> Result<Vec<ChunkInfo>> {
    let mut cursor = ByteCursor::new(body);
    let count = cursor.read_u32()? as usize;
    let mut chunks = Vec::with_capacity(count.min(cursor.remaining() / 38));
    for _ in 0..count {
        chunks.push(ChunkInfo::decode(&mut cursor)?);
    }
    if !cursor.is_empty() {
        return Err(StreamError::decode(
            "chunk index",
            format!("{} trailing bytes", cursor.remaining()),
        ));
    }
    Ok(chunks)
}

/// Body of an inline index record: `entry | crc32(entry)`.
pub fn encode_inline_index(chunk: &ChunkInfo) -> Vec<u8> {
    let mut buf = ByteBuffer::with_capacity(48);
    chunk.encode(&mut buf);
    let crc = crc32fast::hash(buf.as_slice());
    buf.put_u32(crc);
    buf.into_vec()
}

/// Decode an inline index record body, verifying its checksum.
pub fn decode_inline_index(body: &[u8]) -> Result<ChunkInfo> {
    if body.len() < 4 {
        return Err(StreamError::buffer_too_short(4, body.len(), 0));
    }
    let (entry, crc) = body.split_at(body.len() - 4);
    let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
    let computed = crc32fast::hash(entry);
    if stored != computed {
        return Err(StreamError::decode(
            "inline chunk index",
            format!("checksum mismatch (stored {stored:08x}, computed {computed:08x})"),
        ));
    }
    let mut cursor = ByteCursor::new(entry);
    let chunk = ChunkInfo::decode(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(StreamError::decode("inline chunk index", "trailing bytes"));
    }
    Ok(chunk)
}

/// Pending chunks of an open writer, arranged by layout.
#[derive(Debug)]
pub(crate) struct PendingChunks {
    layout: ChunksLayout,
    shared: ChunkBuilder,
    per_stream: BTreeMap<u32, ChunkBuilder>,
}

impl PendingChunks {
    pub(crate) fn new(layout: ChunksLayout) -> Self {
        Self {
            layout,
            shared: ChunkBuilder::new(),
            per_stream: BTreeMap::new(),
        }
    }

    /// Pending chunk that receives messages of `stream_id`.
    pub(crate) fn builder_for(&mut self, stream_id: u32) -> &mut ChunkBuilder {
        match self.layout {
            ChunksLayout::Standard => &mut self.shared,
            ChunksLayout::Streaming => self.per_stream.entry(stream_id).or_default(),
        }
    }

    /// Seal every non-empty pending chunk, in stream id order.
    pub(crate) fn seal_all(&mut self) -> Vec<SealedChunk> {
        match self.layout {
            ChunksLayout::Standard if self.shared.is_empty() => Vec::new(),
            ChunksLayout::Standard => vec![self.shared.finish()],
            ChunksLayout::Streaming => self
                .per_stream
                .values_mut()
                .filter(|b| !b.is_empty())
                .map(|b| b.finish())
                .collect(),
        }
    }

    /// Streams that currently have a non-empty pending chunk.
    pub(crate) fn pending_streams(&self) -> Vec<u32> {
        match self.layout {
            ChunksLayout::Standard => self.shared.stream_ids(),
            ChunksLayout::Streaming => self
                .per_stream
                .iter()
                .filter(|(_, b)| !b.is_empty())
                .map(|(id, _)| *id)
                .collect(),
        }
    }
}
