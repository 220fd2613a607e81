// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Stream file writer.
//!
//! The writer is a two-state machine: OPEN until [`Writer::close`], CLOSED
//! afterwards. While open it buffers messages into pending chunks and
//! flushes a chunk once its encoded size crosses the configured threshold.
//! Closing flushes what is left, derives the [`StreamingInfo`] entry,
//! and writes the footer (metadata table, chunk index, trailer) in a single
//! write so that an interrupted close never leaves a valid-looking trailer.
//!
//! A failed write leaves the writer poisoned: every later call fails and
//! `close` refuses to seal, so the file never carries a trailer that
//! disagrees with its chunks.
//!
//! The writer is not internally synchronized; callers sharing it between
//! threads must serialize access themselves.

pub mod builder;

pub use builder::{WriterBuilder, WriterConfig};

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::bytes::ByteBuffer;
use crate::core::registry::{self, TypeRegistry};
use crate::core::{Result, StreamError};
use crate::io::chunk::{Message, SealedChunk};
use crate::io::constants::{OP_CHUNK, OP_CHUNK_INDEX, OP_META_ENTRY};
use crate::io::footer::{FileHeader, Footer};
use crate::io::layout::{encode_inline_index, ChunkInfo, ChunksLayout, PendingChunks};
use crate::io::record::encode_record;
use crate::metadata::store::encode_entry;
use crate::metadata::{
    ChunkStreams, MetadataEntry, MetadataKind, MetadataStore, StreamDescriptor, StreamStats,
    StreamingInfo,
};

/// Per-stream writer state.
#[derive(Debug, Clone)]
struct StreamState {
    descriptor: StreamDescriptor,
    last_ts: Option<u64>,
}

/// Writes a stream file.
pub struct Writer {
    path: PathBuf,
    /// Output sink, taken when the writer is closed
    sink: Option<BufWriter<File>>,
    /// Current write position
    position: u64,
    header: FileHeader,
    chunk_size: usize,
    message_index: bool,
    store: MetadataStore,
    /// Registry snapshot used to validate message schema ids
    registry: TypeRegistry,
    streams: BTreeMap<u32, StreamState>,
    pending: PendingChunks,
    /// Index of flushed chunks, in file order
    chunks: Vec<ChunkInfo>,
    info: StreamingInfo,
    next_seq: u64,
    message_count: u64,
    closed: bool,
    /// Set by the first failed write
    failed: bool,
}

impl Writer {
    /// Create a writer with the default configuration.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(path, WriterConfig::default())
    }

    /// Create a writer with an explicit configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: WriterConfig) -> Result<Self> {
        Self::with_registry(path, config, registry::snapshot())
    }

    /// Create a writer that validates message schemas against `registry`
    /// instead of the process-wide one.
    pub fn with_registry<P: AsRef<Path>>(
        path: P,
        config: WriterConfig,
        registry: TypeRegistry,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|e| StreamError::io(format!("creating {}", path.display()), e))?;

        let file_id = config
            .file_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let header = FileHeader::new(config.layout, file_id);

        let mut writer = Self {
            path,
            sink: Some(BufWriter::new(file)),
            position: 0,
            header,
            chunk_size: config.effective_chunk_size(),
            message_index: config.message_index,
            store: MetadataStore::new(),
            registry,
            streams: BTreeMap::new(),
            pending: PendingChunks::new(config.layout),
            chunks: Vec::new(),
            info: StreamingInfo::new(),
            next_seq: 0,
            message_count: 0,
            closed: false,
            failed: false,
        };
        let header_bytes = writer.header.encode();
        writer.write_bytes(&header_bytes)?;

        tracing::debug!(
            path = %writer.path.display(),
            layout = %config.layout,
            chunk_size = writer.chunk_size,
            "created writer"
        );
        Ok(writer)
    }

    /// Add a metadata value, returning its id.
    pub fn add_metadata<K: MetadataKind>(&mut self, value: K) -> Result<u32> {
        self.insert_entry(None, MetadataEntry::new(value))
    }

    /// Add a copy of an existing entry (e.g. read from another file),
    /// returning its new id.
    pub fn add_metadata_entry(&mut self, entry: MetadataEntry) -> Result<u32> {
        self.insert_entry(None, entry)
    }

    /// Add a metadata value under a caller-chosen id.
    pub fn add_metadata_with_id<K: MetadataKind>(&mut self, id: u32, value: K) -> Result<()> {
        self.insert_entry(Some(id), MetadataEntry::new(value))
            .map(|_| ())
    }

    /// Add a copy of an existing entry under a caller-chosen id.
    pub fn add_metadata_entry_with_id(&mut self, id: u32, entry: MetadataEntry) -> Result<()> {
        self.insert_entry(Some(id), entry).map(|_| ())
    }

    /// Declare a stream, returning its stream id.
    ///
    /// The stream id is the id of the descriptor's metadata entry.
    pub fn add_stream(&mut self, descriptor: StreamDescriptor) -> Result<u32> {
        self.insert_entry(None, MetadataEntry::new(descriptor))
    }

    /// Append a message to a stream.
    ///
    /// Timestamps within a stream must be non-decreasing; a regression is
    /// rejected and nothing is recorded. Counters and statistics only move
    /// once the message is safely buffered or flushed.
    pub fn save(&mut self, stream_id: u32, ts: u64, data: &[u8]) -> Result<()> {
        self.ensure_open("save")?;
        let state = self.streams.get(&stream_id).ok_or_else(|| {
            StreamError::usage("save", format!("unknown stream id {stream_id}"))
        })?;
        if let Some(last) = state.last_ts {
            if ts < last {
                return Err(StreamError::usage(
                    "save",
                    format!(
                        "timestamp {ts} precedes last timestamp {last} of stream {stream_id}"
                    ),
                ));
            }
        }
        if data.len() > u32::MAX as usize {
            return Err(StreamError::usage(
                "save",
                format!("payload of {} bytes exceeds the 4GB limit", data.len()),
            ));
        }

        let seq = self.next_seq;
        let builder = self.pending.builder_for(stream_id);
        builder.push(stream_id, seq, ts, data);
        if builder.size() >= self.chunk_size {
            let sealed = builder.finish();
            self.write_chunk(sealed)?;
        }

        self.next_seq += 1;
        self.message_count += 1;
        if let Some(state) = self.streams.get_mut(&stream_id) {
            state.last_ts = Some(ts);
        }
        if let Some(stats) = self.info.stream_stats.get_mut(&stream_id) {
            stats.record(ts, data.len(), self.message_index);
        }
        Ok(())
    }

    /// Append a message; its `seq` is ignored and reassigned.
    pub fn save_message(&mut self, message: &Message) -> Result<()> {
        self.save(message.stream_id, message.ts, &message.data)
    }

    /// Seal the file.
    ///
    /// Calling `close` on a closed writer is a no-op. After a failed close
    /// the writer is closed as well; the file has no valid trailer. A
    /// writer poisoned by an earlier failed write is closed without
    /// sealing and reports an error.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = if self.failed {
            Err(StreamError::usage(
                "close",
                "an earlier write failed, file left unsealed",
            ))
        } else {
            self.seal()
        };
        self.sink = None;
        match &result {
            Ok(()) => tracing::debug!(
                path = %self.path.display(),
                chunks = self.chunks.len(),
                messages = self.message_count,
                metadata = self.store.len(),
                "closed writer"
            ),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to seal file"
            ),
        }
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a write has failed; a failed writer cannot be sealed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chunk flush threshold in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn layout(&self) -> ChunksLayout {
        self.header.layout
    }

    pub fn file_id(&self) -> &str {
        &self.header.file_id
    }

    /// Messages saved so far.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Chunks flushed to the file so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn metadata_store(&self) -> &MetadataStore {
        &self.store
    }

    /// Descriptor of a declared stream.
    pub fn stream(&self, stream_id: u32) -> Option<&StreamDescriptor> {
        self.streams.get(&stream_id).map(|s| &s.descriptor)
    }

    /// Running statistics of a declared stream.
    pub fn stream_stats(&self, stream_id: u32) -> Option<&StreamStats> {
        self.info.stats(stream_id)
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.closed {
            return Err(StreamError::usage(operation, "writer is closed"));
        }
        if self.failed {
            return Err(StreamError::usage(operation, "an earlier write failed"));
        }
        Ok(())
    }

    fn insert_entry(&mut self, id: Option<u32>, entry: MetadataEntry) -> Result<u32> {
        self.ensure_open("add_metadata")?;
        if entry.is::<StreamingInfo>() {
            return Err(StreamError::usage(
                "add_metadata",
                "streaming info is derived by the writer",
            ));
        }
        let descriptor = if entry.is::<StreamDescriptor>() {
            Some(self.validate_stream(&entry)?)
        } else {
            None
        };

        // The last id stays free for the streaming info added on close.
        let exhausted = match id {
            Some(id) => id == u32::MAX,
            None => self.store.next_id().map_or(true, |next| next == u32::MAX),
        };
        if exhausted {
            return Err(StreamError::usage(
                "add_metadata",
                "metadata id space exhausted",
            ));
        }

        let id = match id {
            Some(id) => {
                self.store.insert_with_id(id, entry)?;
                id
            }
            None => self.store.add_entry(entry)?,
        };

        if self.header.layout.is_streaming() {
            if let Some(stored) = self.store.get(id) {
                let mut body = ByteBuffer::new();
                encode_entry(&mut body, stored);
                let record = encode_record(OP_META_ENTRY, body.as_slice());
                self.write_bytes(&record)?;
            }
        }

        if let Some(descriptor) = descriptor {
            tracing::debug!(stream_id = id, name = %descriptor.name, "added stream");
            self.streams.insert(
                id,
                StreamState {
                    descriptor,
                    last_ts: None,
                },
            );
            self.info.stream_stats.insert(id, StreamStats::new(id));
        }
        Ok(id)
    }

    fn validate_stream(&self, entry: &MetadataEntry) -> Result<StreamDescriptor> {
        let descriptor = entry.as_kind::<StreamDescriptor>().ok_or_else(|| {
            StreamError::usage("add_stream", "stream descriptor buffer does not decode")
        })?;
        if self.registry.message_schema(descriptor.type_id).is_none() {
            return Err(StreamError::usage(
                "add_stream",
                format!("unknown message schema id {}", descriptor.type_id),
            ));
        }
        if descriptor.source_meta_id != 0 && self.store.get(descriptor.source_meta_id).is_none() {
            return Err(StreamError::usage(
                "add_stream",
                format!("source metadata id {} not found", descriptor.source_meta_id),
            ));
        }
        Ok(descriptor)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let result = match self.sink.as_mut() {
            Some(sink) => sink
                .write_all(data)
                .map_err(|e| StreamError::io(format!("writing {}", self.path.display()), e)),
            None => Err(StreamError::usage("write", "writer is closed")),
        };
        match result {
            Ok(()) => {
                self.position += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn write_chunk(&mut self, sealed: SealedChunk) -> Result<()> {
        let offset = self.position;
        let record = encode_record(OP_CHUNK, &sealed.body);
        self.write_bytes(&record)?;

        let chunk = ChunkInfo {
            offset,
            length: record.len() as u64,
            start_ts: sealed.start_ts,
            end_ts: sealed.end_ts,
            message_count: sealed.message_count,
            stream_ids: sealed.stream_ids,
        };
        for id in &chunk.stream_ids {
            if let Some(stats) = self.info.stream_stats.get_mut(id) {
                stats.add_chunk(offset);
            }
        }
        self.info.chunks.insert(
            offset,
            ChunkStreams {
                stream_ids: chunk.stream_ids.clone(),
                message_count: chunk.message_count,
            },
        );

        if self.header.layout.is_streaming() {
            let index = encode_record(OP_CHUNK_INDEX, &encode_inline_index(&chunk));
            self.write_bytes(&index)?;
        }

        tracing::debug!(
            offset,
            length = chunk.length,
            messages = chunk.message_count,
            start_ts = chunk.start_ts,
            end_ts = chunk.end_ts,
            "flushed chunk"
        );
        self.chunks.push(chunk);
        Ok(())
    }

    fn seal(&mut self) -> Result<()> {
        for sealed in self.pending.seal_all() {
            self.write_chunk(sealed)?;
        }

        self.store.add(self.info.clone())?;
        let metadata_offset = self.position;
        let footer = Footer::encode(metadata_offset, &self.store, &self.chunks);
        self.write_bytes(&footer)?;

        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| StreamError::usage("close", "writer is closed"))?;
        sink.flush()
            .map_err(|e| StreamError::io(format!("flushing {}", self.path.display()), e))?;
        sink.get_ref()
            .sync_all()
            .map_err(|e| StreamError::io(format!("syncing {}", self.path.display()), e))?;
        Ok(())
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("path", &self.path)
            .field("layout", &self.header.layout)
            .field("chunk_size", &self.chunk_size)
            .field("streams", &self.streams.len())
            .field("messages", &self.message_count)
            .field("chunks", &self.chunks.len())
            .field("closed", &self.closed)
            .field("failed", &self.failed)
            .finish()
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::warn!(path = %self.path.display(), "writer dropped without close, sealing");
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to seal on drop");
        }
    }
}
