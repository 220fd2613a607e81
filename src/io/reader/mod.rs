// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Stream file reader.
//!
//! Opening a file maps it, validates the header and the footer checksum,
//! and loads the metadata store and chunk index. Chunk payloads are only
//! decoded when a message iterator or [`Reader::read_chunk`] reaches them.
//!
//! # Example
//!
//! ```rust,no_run
//! use robostream::io::Reader;
//!
//! let reader = Reader::open("capture.rsf")?;
//! for (id, stream) in reader.streams() {
//!     println!("{id}: {}", stream.name);
//! }
//! for message in reader.messages_in_range(1_000, 2_000) {
//!     let message = message?;
//!     println!("{} @ {}", message.stream_id, message.ts);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! A reader over a closed file is immutable and may be shared between
//! threads; each message iterator carries its own cursor.

pub mod builder;
pub mod iter;

pub use builder::{ReaderBuilder, ReaderConfig};
pub use iter::MessageIter;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::registry::TypeRegistry;
use crate::core::{Result, StreamError};
use crate::io::arena::MappedFile;
use crate::io::chunk::ChunkBody;
use crate::io::constants::OP_CHUNK;
use crate::io::filter::MessageFilter;
use crate::io::footer::{FileHeader, Footer, Trailer};
use crate::io::layout::{ChunkInfo, ChunksLayout};
use crate::io::record::expect_record;
use crate::io::recovery::scan_records;
use crate::metadata::{MetadataStore, StreamDescriptor, StreamStats, StreamingInfo};

/// Reads a stream file.
pub struct Reader {
    path: PathBuf,
    file: MappedFile,
    header: FileHeader,
    /// Offset of the first record after the header
    data_start: u64,
    /// Offset where chunk data ends (footer start, or recovered length)
    data_end: u64,
    store: MetadataStore,
    chunks: Vec<ChunkInfo>,
    streams: BTreeMap<u32, StreamDescriptor>,
    info: Option<StreamingInfo>,
    registry: Arc<TypeRegistry>,
    recovered: bool,
    sorted_by_start: bool,
}

impl Reader {
    /// Open a sealed file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ReaderBuilder::new().path(path).build()
    }

    /// Open a file, rebuilding the index of an unsealed streaming-layout
    /// file from its inline records.
    pub fn recover<P: AsRef<Path>>(path: P) -> Result<Self> {
        ReaderBuilder::new().path(path).recover(true).build()
    }

    pub(crate) fn open_with(path: &Path, recover: bool, registry: Arc<TypeRegistry>) -> Result<Self> {
        let file = MappedFile::open(path)?;
        let path_str = file.path().to_string();
        let data = file.data();

        let (header, data_start) = FileHeader::read(data, &path_str)?;
        let data_start = data_start as u64;
        let file_len = data.len() as u64;

        let (store, chunks, data_end, recovered) = match Trailer::locate(data, &path_str)? {
            Some(trailer) => {
                if trailer.metadata_offset < data_start || trailer.metadata_offset > file_len {
                    return Err(StreamError::corruption(
                        &path_str,
                        format!(
                            "metadata offset {} outside file of {file_len} bytes",
                            trailer.metadata_offset
                        ),
                    ));
                }
                let region = file.slice(trailer.metadata_offset, file_len - trailer.metadata_offset)?;
                let footer = Footer::decode(region, &trailer, &path_str)?;
                for chunk in &footer.chunks {
                    if chunk.offset < data_start || chunk.end() > trailer.metadata_offset {
                        return Err(StreamError::corruption(
                            &path_str,
                            format!(
                                "chunk at {} (+{}) lies outside the data region",
                                chunk.offset, chunk.length
                            ),
                        ));
                    }
                }
                (footer.store, footer.chunks, trailer.metadata_offset, false)
            }
            None if recover && header.layout.is_streaming() => {
                tracing::warn!(path = %path_str, "no trailer, recovering from inline index records");
                let recovered = scan_records(data, data_start as usize);
                (recovered.store, recovered.chunks, recovered.valid_len, true)
            }
            None if recover => {
                return Err(StreamError::corruption(
                    &path_str,
                    "standard-layout file has no trailer and cannot be recovered",
                ));
            }
            None => {
                return Err(StreamError::corruption(
                    &path_str,
                    "missing trailer (file was not closed)",
                ));
            }
        };

        let info = store.first::<StreamingInfo>();
        let streams = store.find::<StreamDescriptor>();
        let sorted_by_start = chunks.windows(2).all(|w| w[0].start_ts <= w[1].start_ts);

        for entry in store.iter() {
            if !registry.contains(entry.type_name()) {
                tracing::warn!(
                    id = entry.id(),
                    type_name = entry.type_name(),
                    "metadata type is not registered"
                );
            }
        }
        tracing::debug!(
            path = %path_str,
            layout = %header.layout,
            chunks = chunks.len(),
            metadata = store.len(),
            streams = streams.len(),
            recovered,
            "opened reader"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            data_start,
            data_end,
            store,
            chunks,
            streams,
            info,
            registry,
            recovered,
            sorted_by_start,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_id(&self) -> &str {
        &self.header.file_id
    }

    pub fn layout(&self) -> ChunksLayout {
        self.header.layout
    }

    /// Format version from the header.
    pub fn version(&self) -> u16 {
        self.header.version
    }

    pub fn metadata_store(&self) -> &MetadataStore {
        &self.store
    }

    /// Registry used for structured metadata access.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Declared streams by stream id.
    pub fn streams(&self) -> &BTreeMap<u32, StreamDescriptor> {
        &self.streams
    }

    pub fn stream(&self, stream_id: u32) -> Option<&StreamDescriptor> {
        self.streams.get(&stream_id)
    }

    /// Persisted statistics of a stream; None for unknown streams and for
    /// files without stream info.
    pub fn stream_stats(&self, stream_id: u32) -> Option<&StreamStats> {
        self.info.as_ref().and_then(|info| info.stats(stream_id))
    }

    /// Stream info entry, when the file carries one.
    pub fn streaming_info(&self) -> Option<&StreamingInfo> {
        self.info.as_ref()
    }

    /// Smallest message timestamp, None for a file without messages.
    pub fn start_ts(&self) -> Option<u64> {
        self.chunks.iter().map(|c| c.start_ts).min()
    }

    /// Largest message timestamp, None for a file without messages.
    pub fn end_ts(&self) -> Option<u64> {
        self.chunks.iter().map(|c| c.end_ts).max()
    }

    /// Messages across all indexed chunks.
    pub fn message_count(&self) -> u64 {
        self.chunks.iter().map(|c| c.message_count as u64).sum()
    }

    pub fn has_stream_info(&self) -> bool {
        self.info.is_some()
    }

    /// Whether timestamp/index lookups can use the persisted index.
    pub fn has_message_idx(&self) -> bool {
        self.info.as_ref().is_some_and(|info| info.has_message_idx())
    }

    /// Whether the index was rebuilt from an unsealed file.
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Chunk descriptors in file order.
    pub fn chunks(&self) -> std::slice::Iter<'_, ChunkInfo> {
        self.chunks.iter()
    }

    /// Chunks whose time bounds intersect `[start, end]`.
    pub fn chunks_in_range(&self, start: u64, end: u64) -> impl Iterator<Item = &ChunkInfo> + '_ {
        self.chunks.iter().filter(move |c| c.intersects(start, end))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Decode one chunk.
    pub fn read_chunk(&self, chunk: &ChunkInfo) -> Result<ChunkBody> {
        let path = self.file.path();
        if chunk.offset < self.data_start || chunk.end() > self.data_end {
            return Err(StreamError::corruption(
                path,
                format!("chunk at {} (+{}) outside the data region", chunk.offset, chunk.length),
            ));
        }
        let bytes = self.file.slice(chunk.offset, chunk.length)?;
        let record = expect_record(bytes, 0, OP_CHUNK, "chunk").map_err(|e| e.into_corruption(path))?;
        if record.end() as u64 != chunk.length {
            return Err(StreamError::corruption(
                path,
                format!(
                    "chunk at {} is {} bytes, index says {}",
                    chunk.offset,
                    record.end(),
                    chunk.length
                ),
            ));
        }
        ChunkBody::decode(record.body).map_err(|e| e.into_corruption(path))
    }

    /// Every message.
    pub fn messages(&self) -> MessageIter<'_> {
        self.messages_filtered(MessageFilter::all())
    }

    /// Messages with `start <= ts <= end`.
    pub fn messages_in_range(&self, start: u64, end: u64) -> MessageIter<'_> {
        self.messages_filtered(MessageFilter::in_range(start, end))
    }

    /// Messages of the listed streams.
    pub fn messages_for_streams(&self, stream_ids: &[u32]) -> MessageIter<'_> {
        self.messages_filtered(MessageFilter::for_streams(stream_ids))
    }

    /// Messages of the listed streams with `start <= ts <= end`.
    pub fn messages_for_streams_in_range(
        &self,
        stream_ids: &[u32],
        start: u64,
        end: u64,
    ) -> MessageIter<'_> {
        self.messages_filtered(MessageFilter::for_streams(stream_ids).with_range(start, end))
    }

    /// Messages matching an arbitrary filter.
    pub fn messages_filtered(&self, filter: MessageFilter) -> MessageIter<'_> {
        MessageIter::new(self, filter)
    }

    /// Timestamp of the `idx`-th message of a stream.
    ///
    /// Uses the persisted message index when present, otherwise scans the
    /// stream's chunks.
    pub fn ts_by_message_idx(&self, stream_id: u32, idx: u64) -> Result<Option<u64>> {
        if !self.streams.contains_key(&stream_id) {
            return Ok(None);
        }
        if let Some(stats) = self.indexed_stats(stream_id) {
            return Ok(usize::try_from(idx)
                .ok()
                .and_then(|i| stats.message_timestamps.get(i).copied()));
        }

        tracing::warn!(stream_id, "no message index, scanning stream");
        for (i, message) in self.messages_for_streams(&[stream_id]).enumerate() {
            let message = message?;
            if i as u64 == idx {
                return Ok(Some(message.ts));
            }
        }
        Ok(None)
    }

    /// Index of the first message of a stream with timestamp `>= ts`.
    pub fn message_idx_by_ts(&self, stream_id: u32, ts: u64) -> Result<Option<u64>> {
        if !self.streams.contains_key(&stream_id) {
            return Ok(None);
        }
        if let Some(stats) = self.indexed_stats(stream_id) {
            let idx = stats.message_timestamps.partition_point(|&t| t < ts);
            return Ok((idx < stats.message_timestamps.len()).then_some(idx as u64));
        }

        tracing::warn!(stream_id, "no message index, scanning stream");
        for (i, message) in self.messages_for_streams(&[stream_id]).enumerate() {
            if message?.ts >= ts {
                return Ok(Some(i as u64));
            }
        }
        Ok(None)
    }

    fn indexed_stats(&self, stream_id: u32) -> Option<&StreamStats> {
        self.stream_stats(stream_id).filter(|s| s.has_message_idx())
    }

    pub(crate) fn chunk_index(&self) -> &[ChunkInfo] {
        &self.chunks
    }

    pub(crate) fn sorted_by_start(&self) -> bool {
        self.sorted_by_start
    }

    /// Offset where the chunk data region ends: the footer start of a
    /// sealed file, or the recovered length of an unsealed one.
    pub fn data_end(&self) -> u64 {
        self.data_end
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("path", &self.path)
            .field("layout", &self.header.layout)
            .field("file_id", &self.header.file_id)
            .field("chunks", &self.chunks.len())
            .field("metadata", &self.store.len())
            .field("recovered", &self.recovered)
            .finish()
    }
}
