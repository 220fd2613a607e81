// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Stream file format constants.
//!
//! Single source of truth for magic bytes, opcodes and fixed record sizes
//! shared by the writer, the reader and the maintenance tools.

/// File magic bytes (at start and end of a sealed file).
pub const MAGIC: [u8; 8] = [0x89, b'R', b'S', b'T', b'R', b'M', 0x0D, 0x0A];

/// Magic bytes at the start of a metadata backup file.
pub const BACKUP_MAGIC: [u8; 8] = [0x89, b'R', b'S', b'B', b'A', b'K', 0x0D, 0x0A];

/// Current format version, written in the header record.
pub const FORMAT_VERSION: u16 = 1;

/// Header record - first record after the leading magic.
pub const OP_HEADER: u8 = 0x01;
/// Chunk record - a run of messages.
pub const OP_CHUNK: u8 = 0x02;
/// Inline chunk index record (streaming layout, follows its chunk).
pub const OP_CHUNK_INDEX: u8 = 0x03;
/// Inline metadata entry record (streaming layout).
pub const OP_META_ENTRY: u8 = 0x04;
/// Metadata table record - first record of the footer.
pub const OP_METADATA: u8 = 0x05;
/// Chunk index table record.
pub const OP_INDEX: u8 = 0x06;
/// Trailer record - offsets and checksum, followed by the closing magic.
pub const OP_TRAILER: u8 = 0x0F;

/// Record framing: opcode (u8) + body length (u64).
pub const RECORD_HEADER_LEN: usize = 9;

/// Trailer body: metadata_offset (u64) + index_offset (u64) + crc32 (u32).
pub const TRAILER_BODY_LEN: usize = 20;

/// Trailer record plus closing magic.
pub const TRAILER_LEN: usize = RECORD_HEADER_LEN + TRAILER_BODY_LEN + MAGIC.len();

/// Bytes at the end of the file not covered by the checksum (crc + magic).
pub const TRAILER_UNCHECKED_LEN: usize = 4 + MAGIC.len();

/// Chunk body header: start_ts (u64) + end_ts (u64) + count (u32).
pub const CHUNK_HEADER_LEN: usize = 20;

/// Message framing inside a chunk: stream_id + seq + ts + len.
pub const MESSAGE_HEADER_LEN: usize = 24;

/// Default chunk flush threshold (4MB of message bytes).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;
