// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! File header, footer and trailer.
//!
//! # File Structure
//!
//! ```text
//! MAGIC | HEADER | (CHUNK [CHUNK_INDEX] | META_ENTRY)* | METADATA | INDEX | TRAILER | MAGIC
//! ```
//!
//! The footer starts at `metadata_offset` and runs to the end of the file.
//! Its checksum covers every footer byte up to the trailer's crc field, so
//! any modified byte of the metadata table, the chunk index or the trailer
//! offsets is detected. Chunk payloads are not checksummed.

use byteorder::{ByteOrder, LittleEndian};

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::{Result, StreamError};
use crate::io::constants::{
    FORMAT_VERSION, MAGIC, OP_HEADER, OP_INDEX, OP_METADATA, OP_TRAILER, RECORD_HEADER_LEN,
    TRAILER_BODY_LEN, TRAILER_LEN, TRAILER_UNCHECKED_LEN,
};
use crate::io::layout::{decode_index, encode_index, ChunkInfo, ChunksLayout};
use crate::io::record::{encode_record, expect_record};
use crate::metadata::MetadataStore;

/// Contents of the header record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u16,
    pub layout: ChunksLayout,
    pub file_id: String,
}

impl FileHeader {
    pub fn new(layout: ChunksLayout, file_id: impl Into<String>) -> Self {
        Self {
            version: FORMAT_VERSION,
            layout,
            file_id: file_id.into(),
        }
    }

    /// Leading magic followed by the header record.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = ByteBuffer::with_capacity(8 + self.file_id.len());
        body.put_u16(self.version);
        body.put_u8(self.layout.as_u8());
        body.put_str(&self.file_id);

        let mut out = MAGIC.to_vec();
        out.extend(encode_record(OP_HEADER, body.as_slice()));
        out
    }

    /// Parse the leading magic and header record.
    ///
    /// Returns the header and the offset of the first record after it.
    pub fn read(data: &[u8], path: &str) -> Result<(Self, usize)> {
        if data.len() < MAGIC.len() || data[..MAGIC.len()] != MAGIC {
            let found = &data[..data.len().min(MAGIC.len())];
            return Err(StreamError::corruption(
                path,
                format!("invalid magic: {}", hex::encode(found)),
            ));
        }
        let record = expect_record(data, MAGIC.len(), OP_HEADER, "header")
            .map_err(|e| e.into_corruption(path))?;

        let mut cursor = ByteCursor::new(record.body);
        let parse = |cursor: &mut ByteCursor<'_>| -> Result<(u16, u8, String)> {
            Ok((cursor.read_u16()?, cursor.read_u8()?, cursor.read_string()?))
        };
        let (version, layout_tag, file_id) =
            parse(&mut cursor).map_err(|e| e.into_corruption(path))?;

        if version == 0 || version > FORMAT_VERSION {
            return Err(StreamError::corruption(
                path,
                format!("unsupported format version {version}"),
            ));
        }
        let layout = ChunksLayout::from_u8(layout_tag).ok_or_else(|| {
            StreamError::corruption(path, format!("unknown layout tag {layout_tag}"))
        })?;

        Ok((
            Self {
                version,
                layout,
                file_id,
            },
            record.end(),
        ))
    }
}

/// Offsets and checksum stored at the very end of a sealed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub metadata_offset: u64,
    pub index_offset: u64,
    pub crc: u32,
}

impl Trailer {
    /// Find the trailer at the end of `data`.
    ///
    /// `Ok(None)` means the data does not end with the closing magic (the
    /// file was never sealed). A closing magic preceded by anything other
    /// than a well-formed trailer record is corruption.
    pub fn locate(data: &[u8], path: &str) -> Result<Option<Self>> {
        if data.len() < TRAILER_LEN || data[data.len() - MAGIC.len()..] != MAGIC {
            return Ok(None);
        }
        let start = data.len() - TRAILER_LEN;
        let len = LittleEndian::read_u64(&data[start + 1..start + RECORD_HEADER_LEN]);
        if data[start] != OP_TRAILER || len != TRAILER_BODY_LEN as u64 {
            return Err(StreamError::corruption(path, "malformed trailer record"));
        }
        let body = &data[start + RECORD_HEADER_LEN..start + RECORD_HEADER_LEN + TRAILER_BODY_LEN];
        Ok(Some(Self {
            metadata_offset: LittleEndian::read_u64(&body[0..8]),
            index_offset: LittleEndian::read_u64(&body[8..16]),
            crc: LittleEndian::read_u32(&body[16..20]),
        }))
    }
}

/// Decoded footer: metadata table and chunk index.
#[derive(Debug, Clone)]
pub struct Footer {
    pub trailer: Trailer,
    pub store: MetadataStore,
    pub chunks: Vec<ChunkInfo>,
}

impl Footer {
    /// Serialize a footer that will start at `metadata_offset`.
    pub fn encode(metadata_offset: u64, store: &MetadataStore, chunks: &[ChunkInfo]) -> Vec<u8> {
        let mut out = encode_record(OP_METADATA, &store.serialize());
        let index_offset = metadata_offset + out.len() as u64;
        out.extend(encode_record(OP_INDEX, &encode_index(chunks)));

        out.push(OP_TRAILER);
        out.extend_from_slice(&(TRAILER_BODY_LEN as u64).to_le_bytes());
        out.extend_from_slice(&metadata_offset.to_le_bytes());
        out.extend_from_slice(&index_offset.to_le_bytes());
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&MAGIC);
        out
    }

    /// Validate and decode a footer region.
    ///
    /// `region` holds the bytes from `trailer.metadata_offset` to the end of
    /// the file.
    pub fn decode(region: &[u8], trailer: &Trailer, path: &str) -> Result<Self> {
        if region.len() < TRAILER_LEN {
            return Err(StreamError::corruption(path, "footer region too short"));
        }
        let computed = checksum(region);
        if computed != trailer.crc {
            return Err(StreamError::corruption(
                path,
                format!(
                    "footer checksum mismatch (stored {:08x}, computed {computed:08x})",
                    trailer.crc
                ),
            ));
        }

        let trailer_start = region.len() - TRAILER_LEN;
        let index_start = trailer
            .index_offset
            .checked_sub(trailer.metadata_offset)
            .and_then(|rel| usize::try_from(rel).ok())
            .filter(|rel| *rel <= trailer_start)
            .ok_or_else(|| StreamError::corruption(path, "index offset outside footer"))?;

        let meta = expect_record(region, 0, OP_METADATA, "metadata table")
            .map_err(|e| e.into_corruption(path))?;
        if meta.end() != index_start {
            return Err(StreamError::corruption(
                path,
                "metadata table does not end at the index",
            ));
        }
        let index = expect_record(region, index_start, OP_INDEX, "chunk index")
            .map_err(|e| e.into_corruption(path))?;
        if index.end() != trailer_start {
            return Err(StreamError::corruption(
                path,
                "chunk index does not end at the trailer",
            ));
        }

        let store = MetadataStore::deserialize(meta.body).map_err(|e| e.into_corruption(path))?;
        let chunks = decode_index(index.body).map_err(|e| e.into_corruption(path))?;
        Ok(Self {
            trailer: *trailer,
            store,
            chunks,
        })
    }
}

/// Checksum of a footer region, excluding the crc field and closing magic.
pub fn checksum(region: &[u8]) -> u32 {
    let covered = region.len().saturating_sub(TRAILER_UNCHECKED_LEN);
    crc32fast::hash(&region[..covered])
}

/// Recompute and store the checksum of a footer region in place.
pub fn patch_checksum(region: &mut [u8]) {
    let crc = checksum(region);
    let at = region.len() - TRAILER_UNCHECKED_LEN;
    region[at..at + 4].copy_from_slice(&crc.to_le_bytes());
}
