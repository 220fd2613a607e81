// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Stream and time-range filtering for message iteration.
//!
//! A filter is checked twice: once against a chunk's index entry, so chunks
//! that cannot contain a match are never read, and once per message.

use std::collections::BTreeSet;

use crate::io::chunk::Message;
use crate::io::layout::ChunkInfo;

/// Selects messages by stream id and inclusive timestamp range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFilter {
    /// Allowed streams (None = all streams)
    streams: Option<BTreeSet<u32>>,
    start: u64,
    end: u64,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl MessageFilter {
    /// Match every message.
    pub fn all() -> Self {
        Self {
            streams: None,
            start: 0,
            end: u64::MAX,
        }
    }

    /// Match messages with `start <= ts <= end`.
    pub fn in_range(start: u64, end: u64) -> Self {
        Self::all().with_range(start, end)
    }

    /// Match messages of the listed streams. An empty list matches nothing.
    pub fn for_streams(stream_ids: &[u32]) -> Self {
        Self::all().with_streams(stream_ids)
    }

    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_streams(mut self, stream_ids: &[u32]) -> Self {
        self.streams = Some(stream_ids.iter().copied().collect());
        self
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Allowed streams, None when every stream is allowed.
    pub fn streams(&self) -> Option<&BTreeSet<u32>> {
        self.streams.as_ref()
    }

    /// Whether the range selects nothing.
    pub fn is_empty(&self) -> bool {
        self.start > self.end || self.streams.as_ref().is_some_and(|s| s.is_empty())
    }

    pub fn matches_ts(&self, ts: u64) -> bool {
        self.start <= ts && ts <= self.end
    }

    pub fn matches_stream(&self, stream_id: u32) -> bool {
        self.streams
            .as_ref()
            .map_or(true, |streams| streams.contains(&stream_id))
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.matches_stream(message.stream_id) && self.matches_ts(message.ts)
    }

    /// Whether the chunk can hold a matching message.
    pub fn matches_chunk(&self, chunk: &ChunkInfo) -> bool {
        if self.is_empty() || !chunk.intersects(self.start, self.end) {
            return false;
        }
        match &self.streams {
            None => true,
            Some(streams) => chunk.stream_ids.iter().any(|id| streams.contains(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(start_ts: u64, end_ts: u64, streams: Vec<u32>) -> ChunkInfo {
        ChunkInfo {
            offset: 0,
            length: 0,
            start_ts,
            end_ts,
            message_count: 1,
            stream_ids: streams,
        }
    }

    #[test]
    fn test_filter_all() {
        let filter = MessageFilter::all();
        assert!(filter.matches(&Message::new(7, u64::MAX, vec![])));
        assert!(filter.matches(&Message::new(1, 0, vec![])));
        assert!(filter.matches_chunk(&chunk(0, 10, vec![3])));
    }

    #[test]
    fn test_filter_range_inclusive() {
        let filter = MessageFilter::in_range(10, 20);
        assert!(filter.matches_ts(10));
        assert!(filter.matches_ts(20));
        assert!(!filter.matches_ts(21));
        assert!(filter.matches_chunk(&chunk(20, 30, vec![1])));
        assert!(!filter.matches_chunk(&chunk(21, 30, vec![1])));
        assert!(!filter.matches_chunk(&chunk(0, 9, vec![1])));
    }

    #[test]
    fn test_filter_streams() {
        let filter = MessageFilter::for_streams(&[2, 4]).with_range(0, 100);
        assert!(filter.matches(&Message::new(2, 5, vec![])));
        assert!(!filter.matches(&Message::new(3, 5, vec![])));
        assert!(filter.matches_chunk(&chunk(0, 10, vec![1, 4])));
        assert!(!filter.matches_chunk(&chunk(0, 10, vec![1, 3])));
    }

    #[test]
    fn test_empty_filters() {
        assert!(MessageFilter::for_streams(&[]).is_empty());
        assert!(MessageFilter::in_range(5, 4).is_empty());
        assert!(!MessageFilter::in_range(5, 4).matches_chunk(&chunk(0, 10, vec![1])));
    }
}
