// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Lazy message iteration.
//!
//! Standard-layout files are read in file order. Streaming-layout files
//! hold single-stream chunks, so messages are merged across streams by
//! `(ts, seq)` to come out in timestamp order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::core::{Result, StreamError};
use crate::io::chunk::Message;
use crate::io::filter::MessageFilter;
use crate::io::layout::ChunksLayout;

use super::Reader;

/// Iterator over the messages of a [`Reader`] that match a filter.
///
/// A decoding failure is yielded once as an `Err`, after which the
/// iterator is exhausted.
pub struct MessageIter<'a> {
    reader: &'a Reader,
    filter: MessageFilter,
    order: Order,
    failed: bool,
}

enum Order {
    File(FileOrder),
    Merge(Merge),
}

impl<'a> MessageIter<'a> {
    pub(crate) fn new(reader: &'a Reader, filter: MessageFilter) -> Self {
        let order = match reader.layout() {
            ChunksLayout::Standard => Order::File(FileOrder {
                next_chunk: 0,
                current: Vec::new().into_iter(),
                done: filter.is_empty(),
            }),
            ChunksLayout::Streaming => Order::Merge(Merge::new(reader, &filter)),
        };
        Self {
            reader,
            filter,
            order,
            failed: false,
        }
    }

    /// Filter this iterator applies.
    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }
}

impl Iterator for MessageIter<'_> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = match &mut self.order {
            Order::File(order) => order.next(self.reader, &self.filter),
            Order::Merge(order) => order.next(self.reader, &self.filter),
        };
        match next {
            Ok(message) => message.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

struct FileOrder {
    next_chunk: usize,
    current: std::vec::IntoIter<Message>,
    done: bool,
}

impl FileOrder {
    fn next(&mut self, reader: &Reader, filter: &MessageFilter) -> Result<Option<Message>> {
        loop {
            for message in self.current.by_ref() {
                if filter.matches(&message) {
                    return Ok(Some(message));
                }
            }
            if self.done {
                return Ok(None);
            }

            let chunks = reader.chunk_index();
            let Some(chunk) = chunks.get(self.next_chunk) else {
                self.done = true;
                return Ok(None);
            };
            self.next_chunk += 1;

            if reader.sorted_by_start() && chunk.start_ts > filter.end() {
                self.done = true;
                continue;
            }
            if !filter.matches_chunk(chunk) {
                continue;
            }
            self.current = reader.read_chunk(chunk)?.messages.into_iter();
        }
    }
}

/// Chunks sharing one stream set, consumed in file order.
struct Lane {
    chunks: Vec<usize>,
    next_chunk: usize,
    /// Timestamps inside the lane never decrease
    sorted: bool,
    buffer: std::vec::IntoIter<Message>,
    head: Option<Message>,
}

impl Lane {
    /// Load the next matching message into `head`.
    fn advance(&mut self, reader: &Reader, filter: &MessageFilter) -> Result<()> {
        self.head = None;
        loop {
            for message in self.buffer.by_ref() {
                if filter.matches(&message) {
                    self.head = Some(message);
                    return Ok(());
                }
                if self.sorted && message.ts > filter.end() {
                    self.next_chunk = self.chunks.len();
                    self.buffer = Vec::new().into_iter();
                    return Ok(());
                }
            }

            let Some(&idx) = self.chunks.get(self.next_chunk) else {
                return Ok(());
            };
            self.next_chunk += 1;

            let chunk = reader.chunk_index().get(idx).ok_or_else(|| {
                StreamError::usage("messages", format!("chunk {idx} out of range"))
            })?;
            if self.sorted && chunk.start_ts > filter.end() {
                self.next_chunk = self.chunks.len();
                return Ok(());
            }
            if !filter.matches_chunk(chunk) {
                continue;
            }
            self.buffer = reader.read_chunk(chunk)?.messages.into_iter();
        }
    }
}

struct Merge {
    lanes: Vec<Lane>,
    heap: BinaryHeap<Reverse<(u64, u64, usize)>>,
    started: bool,
    /// Failure hit while refilling a lane, reported on the next call
    pending: Option<StreamError>,
}

impl Merge {
    fn new(reader: &Reader, filter: &MessageFilter) -> Self {
        let mut by_streams: BTreeMap<&[u32], Vec<usize>> = BTreeMap::new();
        if !filter.is_empty() {
            for (idx, chunk) in reader.chunk_index().iter().enumerate() {
                if filter.matches_chunk(chunk) {
                    by_streams
                        .entry(chunk.stream_ids.as_slice())
                        .or_default()
                        .push(idx);
                }
            }
        }
        let lanes = by_streams
            .into_iter()
            .map(|(streams, chunks)| Lane {
                chunks,
                next_chunk: 0,
                sorted: streams.len() == 1,
                buffer: Vec::new().into_iter(),
                head: None,
            })
            .collect::<Vec<_>>();
        Self {
            heap: BinaryHeap::with_capacity(lanes.len()),
            lanes,
            started: false,
            pending: None,
        }
    }

    fn push_head(&mut self, lane_idx: usize) {
        if let Some(head) = &self.lanes[lane_idx].head {
            self.heap.push(Reverse((head.ts, head.seq, lane_idx)));
        }
    }

    fn next(&mut self, reader: &Reader, filter: &MessageFilter) -> Result<Option<Message>> {
        if let Some(e) = self.pending.take() {
            return Err(e);
        }
        if !self.started {
            self.started = true;
            for lane_idx in 0..self.lanes.len() {
                self.lanes[lane_idx].advance(reader, filter)?;
                self.push_head(lane_idx);
            }
        }

        let Some(Reverse((_, _, lane_idx))) = self.heap.pop() else {
            return Ok(None);
        };
        let lane = &mut self.lanes[lane_idx];
        let message = lane.head.take();
        match lane.advance(reader, filter) {
            Ok(()) => self.push_head(lane_idx),
            Err(e) => self.pending = Some(e),
        }
        Ok(message)
    }
}
