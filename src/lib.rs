// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Robostream
//!
//! Chunked, self-describing container for timestamped sensor streams.
//!
//! A file holds any number of streams of opaque messages, grouped into
//! size-bounded chunks that carry their time bounds, plus a table of typed
//! metadata entries (sensor descriptors, calibrations, stream descriptors,
//! stream statistics) stored once in the footer.
//!
//! ## Architecture
//!
//! - `core/` - Errors, byte helpers and the metadata type registry
//! - `metadata/` - Metadata entries, the store and built-in kinds
//! - `io/` - File format, [`Writer`], [`Reader`] and metadata maintenance
//! - `rewriter/` - Re-indexing and layout conversion
//! - `multi/` - Multi-sensor lidar scan writer and reader
//!
//! ## Example: Writing and reading
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use robostream::io::{Reader, Writer};
//! use robostream::metadata::{StreamDescriptor, SCHEMA_RAW};
//!
//! let mut writer = Writer::create("capture.rsf")?;
//! let stream = writer.add_stream(StreamDescriptor::new("imu", SCHEMA_RAW, 0))?;
//! writer.save(stream, 1_000, b"payload")?;
//! writer.close()?;
//!
//! let reader = Reader::open("capture.rsf")?;
//! for message in reader.messages() {
//!     let message = message?;
//!     println!("{} @ {}: {} bytes", message.stream_id, message.ts, message.data.len());
//! }
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{Result, StreamError, Timestamp, TypeRegistry};

// Metadata model
pub mod metadata;

pub use metadata::{MetadataEntry, MetadataKind, MetadataStore};

// File format, reader and writer
pub mod io;

pub use io::{
    backup_metadata, modify_metadata, restore_metadata, ChunkInfo, ChunksLayout, Message,
    MessageFilter, Reader, ReaderBuilder, Writer, WriterBuilder, WriterConfig,
};

// Rewriting
pub mod rewriter;

pub use rewriter::{reindex_in_place, rewrite, RewriteOptions, RewriteStats};

// Multi-sensor layer
pub mod multi;

pub use multi::{MultiWriter, Scan, ScanReader};
