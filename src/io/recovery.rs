// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Rebuilding the index of an unsealed streaming-layout file.
//!
//! A streaming writer follows every chunk with an inline index record and
//! writes metadata entries as they are added. Walking those records from
//! the header onward yields the chunk index and metadata store up to the
//! last chunk whose index record was completely written.

use crate::core::bytes::ByteCursor;
use crate::io::constants::{
    OP_CHUNK, OP_CHUNK_INDEX, OP_INDEX, OP_META_ENTRY, OP_METADATA, OP_TRAILER,
};
use crate::io::layout::{decode_inline_index, ChunkInfo};
use crate::io::record::read_record;
use crate::metadata::store::decode_entry;
use crate::metadata::MetadataStore;

/// State rebuilt from inline records.
#[derive(Debug, Clone)]
pub struct Recovered {
    pub store: MetadataStore,
    pub chunks: Vec<ChunkInfo>,
    /// Offset just past the last record that was recovered
    pub valid_len: u64,
}

/// Walk records starting at `start` until the data ends or stops making
/// sense.
pub fn scan_records(data: &[u8], start: usize) -> Recovered {
    let mut store = MetadataStore::new();
    let mut chunks = Vec::new();
    let mut pending_chunk: Option<(u64, u64)> = None;
    let mut pos = start;
    let mut valid_len = start as u64;

    while let Some(record) = read_record(data, pos) {
        match record.opcode {
            OP_CHUNK => {
                pending_chunk = Some((pos as u64, (record.end() - pos) as u64));
            }
            OP_CHUNK_INDEX => {
                let chunk = match decode_inline_index(record.body) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!(offset = pos, error = %e, "unreadable inline index, stopping");
                        break;
                    }
                };
                if pending_chunk != Some((chunk.offset, chunk.length)) {
                    tracing::warn!(offset = pos, "inline index does not match preceding chunk, stopping");
                    break;
                }
                pending_chunk = None;
                chunks.push(chunk);
                valid_len = record.end() as u64;
            }
            OP_META_ENTRY => {
                let mut cursor = ByteCursor::new(record.body);
                let inserted = decode_entry(&mut cursor)
                    .and_then(|(id, entry)| store.insert_with_id(id, entry));
                if let Err(e) = inserted {
                    tracing::warn!(offset = pos, error = %e, "unreadable metadata entry, stopping");
                    break;
                }
                if pending_chunk.is_none() {
                    valid_len = record.end() as u64;
                }
            }
            OP_METADATA | OP_INDEX | OP_TRAILER => break,
            opcode => {
                tracing::warn!(offset = pos, opcode, "unexpected record, stopping");
                break;
            }
        }
        pos = record.end();
    }

    tracing::debug!(
        chunks = chunks.len(),
        metadata = store.len(),
        valid_len,
        "recovered streaming records"
    );
    Recovered {
        store,
        chunks,
        valid_len,
    }
}
