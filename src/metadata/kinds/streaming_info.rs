// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Derived per-chunk and per-stream statistics.
//!
//! Built by the writer while messages are saved and persisted at close, so
//! readers can answer bounds, count and index queries without touching
//! chunk payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::Result;
use crate::metadata::MetadataKind;

/// Streams present in one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStreams {
    pub stream_ids: Vec<u32>,
    pub message_count: u32,
}

/// Running statistics for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub stream_id: u32,
    pub start_ts: u64,
    pub end_ts: u64,
    pub message_count: u64,
    /// Sum of all payload sizes in bytes
    pub total_size: u64,
    /// Average payload size in bytes, rounded to nearest
    pub message_avg_size: u32,
    /// Offsets of the chunks holding this stream, in file order
    pub chunk_offsets: Vec<u64>,
    /// Timestamp of every message, in save order; empty when the writer
    /// was configured without a message index
    pub message_timestamps: Vec<u64>,
}

impl StreamStats {
    pub fn new(stream_id: u32) -> Self {
        Self {
            stream_id,
            ..Self::default()
        }
    }

    /// Account for one saved message.
    pub fn record(&mut self, ts: u64, size: usize, keep_ts: bool) {
        if self.message_count == 0 {
            self.start_ts = ts;
            self.end_ts = ts;
        } else {
            self.start_ts = self.start_ts.min(ts);
            self.end_ts = self.end_ts.max(ts);
        }
        self.message_count += 1;
        self.total_size = self.total_size.saturating_add(size as u64);
        let n = u128::from(self.message_count);
        let avg = (u128::from(self.total_size) + n / 2) / n;
        self.message_avg_size = u32::try_from(avg).unwrap_or(u32::MAX);
        if keep_ts {
            self.message_timestamps.push(ts);
        }
    }

    /// Account for a flushed chunk holding messages of this stream.
    pub fn add_chunk(&mut self, offset: u64) {
        if self.chunk_offsets.last() != Some(&offset) {
            self.chunk_offsets.push(offset);
        }
    }

    /// Whether every message timestamp was persisted.
    pub fn has_message_idx(&self) -> bool {
        self.message_count > 0 && self.message_timestamps.len() as u64 == self.message_count
    }
}

/// Chunk and stream statistics of a whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingInfo {
    /// Chunk offset -> streams in that chunk
    pub chunks: BTreeMap<u64, ChunkStreams>,
    /// Stream id -> statistics
    pub stream_stats: BTreeMap<u32, StreamStats>,
}

impl StreamingInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, stream_id: u32) -> Option<&StreamStats> {
        self.stream_stats.get(&stream_id)
    }

    /// True when every stream carries a complete message index.
    pub fn has_message_idx(&self) -> bool {
        !self.stream_stats.is_empty()
            && self
                .stream_stats
                .values()
                .all(|s| s.message_count == 0 || s.has_message_idx())
    }

    pub fn message_count(&self) -> u64 {
        self.stream_stats.values().map(|s| s.message_count).sum()
    }
}

impl MetadataKind for StreamingInfo {
    const TYPE: &'static str = "robostream/v1/StreamingInfo";

    fn encode(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(64 + self.chunks.len() * 24);
        buf.put_u32(self.chunks.len() as u32);
        for (offset, chunk) in &self.chunks {
            buf.put_u64(*offset);
            buf.put_u32(chunk.message_count);
            buf.put_u32(chunk.stream_ids.len() as u32);
            for id in &chunk.stream_ids {
                buf.put_u32(*id);
            }
        }
        buf.put_u32(self.stream_stats.len() as u32);
        for stats in self.stream_stats.values() {
            buf.put_u32(stats.stream_id);
            buf.put_u64(stats.start_ts);
            buf.put_u64(stats.end_ts);
            buf.put_u64(stats.message_count);
            buf.put_u64(stats.total_size);
            buf.put_u32(stats.message_avg_size);
            buf.put_u32(stats.chunk_offsets.len() as u32);
            for offset in &stats.chunk_offsets {
                buf.put_u64(*offset);
            }
            buf.put_u32(stats.message_timestamps.len() as u32);
            for ts in &stats.message_timestamps {
                buf.put_u64(*ts);
            }
        }
        buf.into_vec()
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        let mut info = StreamingInfo::new();

        let chunk_count = cursor.read_u32()?;
        for _ in 0..chunk_count {
            let offset = cursor.read_u64()?;
            let message_count = cursor.read_u32()?;
            let n = cursor.read_u32()?;
            let mut stream_ids = Vec::new();
            for _ in 0..n {
                stream_ids.push(cursor.read_u32()?);
            }
            info.chunks.insert(
                offset,
                ChunkStreams {
                    stream_ids,
                    message_count,
                },
            );
        }

        let stream_count = cursor.read_u32()?;
        for _ in 0..stream_count {
            let mut stats = StreamStats::new(cursor.read_u32()?);
            stats.start_ts = cursor.read_u64()?;
            stats.end_ts = cursor.read_u64()?;
            stats.message_count = cursor.read_u64()?;
            stats.total_size = cursor.read_u64()?;
            stats.message_avg_size = cursor.read_u32()?;
            let n = cursor.read_u32()?;
            for _ in 0..n {
                stats.chunk_offsets.push(cursor.read_u64()?);
            }
            let n = cursor.read_u32()?;
            for _ in 0..n {
                stats.message_timestamps.push(cursor.read_u64()?);
            }
            info.stream_stats.insert(stats.stream_id, stats);
        }
        Ok(info)
    }
}
