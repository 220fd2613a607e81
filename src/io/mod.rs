// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for stream files.
//!
//! This module provides the on-disk format (records, chunks, footer), the
//! [`Writer`] and [`Reader`], and the metadata maintenance tools.

pub mod arena;
pub mod chunk;
pub mod constants;
pub mod filter;
pub mod footer;
pub mod layout;
pub mod maintenance;
pub mod record;
pub mod recovery;

// Re-exports
pub use arena::MappedFile;
pub use chunk::{ChunkBody, Message};
pub use filter::MessageFilter;
pub use layout::{ChunkInfo, ChunksLayout};
pub use maintenance::{backup_metadata, modify_metadata, restore_metadata};

// Reader and writer
pub mod reader;
pub mod writer;
pub use reader::{MessageIter, Reader, ReaderBuilder, ReaderConfig};
pub use writer::{Writer, WriterBuilder, WriterConfig};
