// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata-blob maintenance: backup, restore and in-place modification.
//!
//! These operate on the footer region only (metadata table, chunk index and
//! trailer). Chunk payloads are never read or rewritten.
//!
//! # Backup format
//!
//! ```text
//! BACKUP_MAGIC(8) | metadata_offset:u64 | footer bytes
//! ```

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{Result, StreamError};
use crate::io::arena::MappedFile;
use crate::io::constants::{BACKUP_MAGIC, OP_CHUNK, OP_METADATA, RECORD_HEADER_LEN};
use crate::io::footer::{patch_checksum, FileHeader, Footer, Trailer};
use crate::io::reader::Reader;
use crate::io::record::{expect_record, read_record};
use crate::metadata::store::entry_spans;
use crate::metadata::MetadataEntry;

const BACKUP_HEADER_LEN: usize = 16;

/// Copy the footer region of a sealed file into `backup`.
///
/// Returns the number of bytes written.
pub fn backup_metadata<P: AsRef<Path>, Q: AsRef<Path>>(file: P, backup: Q) -> Result<u64> {
    let backup = backup.as_ref();
    let (metadata_offset, region) = read_footer_region(file.as_ref())?;

    let mut out = Vec::with_capacity(BACKUP_HEADER_LEN + region.len());
    out.extend_from_slice(&BACKUP_MAGIC);
    out.extend_from_slice(&metadata_offset.to_le_bytes());
    out.extend_from_slice(&region);
    std::fs::write(backup, &out)
        .map_err(|e| StreamError::io(format!("writing {}", backup.display()), e))?;

    tracing::debug!(
        file = %file.as_ref().display(),
        backup = %backup.display(),
        metadata_offset,
        bytes = out.len(),
        "backed up metadata"
    );
    Ok(out.len() as u64)
}

/// Replace the footer region of `file` with the one stored in `backup`.
///
/// The backup must validate on its own and fit the target: the target
/// header must be readable, the target must be at least `metadata_offset`
/// bytes long, and every chunk the backup indexes must be a chunk record
/// of the target that ends at or before `metadata_offset`.
pub fn restore_metadata<P: AsRef<Path>, Q: AsRef<Path>>(file: P, backup: Q) -> Result<()> {
    let file = file.as_ref();
    let backup = backup.as_ref();
    let backup_display = backup.to_string_lossy().to_string();
    let target_display = file.to_string_lossy().to_string();

    let raw = std::fs::read(backup)
        .map_err(|e| StreamError::io(format!("reading {backup_display}"), e))?;
    if raw.len() < BACKUP_HEADER_LEN || raw[..BACKUP_MAGIC.len()] != BACKUP_MAGIC {
        return Err(StreamError::corruption(&backup_display, "not a metadata backup"));
    }
    let metadata_offset = LittleEndian::read_u64(&raw[8..16]);
    let region = &raw[BACKUP_HEADER_LEN..];

    let trailer = Trailer::locate(region, &backup_display)?
        .ok_or_else(|| StreamError::corruption(&backup_display, "backup has no trailer"))?;
    if trailer.metadata_offset != metadata_offset {
        return Err(StreamError::corruption(
            &backup_display,
            format!(
                "backup header says offset {metadata_offset}, trailer says {}",
                trailer.metadata_offset
            ),
        ));
    }
    let footer = Footer::decode(region, &trailer, &backup_display)?;

    {
        let mapped = MappedFile::open(file)?;
        let data = mapped.data();
        let (_, data_start) = FileHeader::read(data, &target_display)?;
        if (data.len() as u64) < metadata_offset || (data_start as u64) > metadata_offset {
            return Err(StreamError::usage(
                "restore_metadata",
                format!(
                    "backup footer starts at {metadata_offset}, target data region is {data_start}..{}",
                    data.len()
                ),
            ));
        }
        for chunk in &footer.chunks {
            let fits = chunk.offset >= data_start as u64 && chunk.end() <= metadata_offset;
            let record = usize::try_from(chunk.offset)
                .ok()
                .filter(|_| fits)
                .and_then(|offset| read_record(data, offset));
            let matches = record.is_some_and(|r| {
                r.opcode == OP_CHUNK && (r.end() - r.offset) as u64 == chunk.length
            });
            if !matches {
                return Err(StreamError::usage(
                    "restore_metadata",
                    format!(
                        "backup indexes a chunk at {} (+{}) the target does not hold",
                        chunk.offset, chunk.length
                    ),
                ));
            }
        }
    }

    let mut out = OpenOptions::new()
        .write(true)
        .open(file)
        .map_err(|e| StreamError::io(format!("opening {target_display}"), e))?;
    out.set_len(metadata_offset)
        .map_err(|e| StreamError::io(format!("truncating {target_display}"), e))?;
    out.seek(SeekFrom::Start(metadata_offset))
        .map_err(|e| StreamError::io(format!("seeking {target_display}"), e))?;
    out.write_all(region)
        .map_err(|e| StreamError::io(format!("writing {target_display}"), e))?;
    out.sync_all()
        .map_err(|e| StreamError::io(format!("syncing {target_display}"), e))?;
    drop(out);

    Reader::open(file)?;
    tracing::debug!(
        file = %target_display,
        backup = %backup_display,
        metadata_offset,
        "restored metadata"
    );
    Ok(())
}

/// Overwrite metadata entries of a sealed file in place.
///
/// Each replacement must name an existing id, keep that entry's type and
/// have exactly the same buffer length. The footer checksum is updated.
pub fn modify_metadata<P: AsRef<Path>>(
    file: P,
    entries: &BTreeMap<u32, MetadataEntry>,
) -> Result<()> {
    let file = file.as_ref();
    let path_str = file.to_string_lossy().to_string();
    let (metadata_offset, mut region) = read_footer_region(file)?;

    let table = expect_record(&region, 0, OP_METADATA, "metadata table")
        .map_err(|e| e.into_corruption(&path_str))?;
    let spans = entry_spans(table.body).map_err(|e| e.into_corruption(&path_str))?;

    for (id, entry) in entries {
        let span = spans.iter().find(|s| s.id == *id).ok_or_else(|| {
            StreamError::usage("modify_metadata", format!("metadata id {id} not found"))
        })?;
        if span.type_name != entry.type_name() {
            return Err(StreamError::usage(
                "modify_metadata",
                format!(
                    "entry {id} is {}, replacement is {}",
                    span.type_name,
                    entry.type_name()
                ),
            ));
        }
        if span.buffer.len() != entry.buffer().len() {
            return Err(StreamError::usage(
                "modify_metadata",
                format!(
                    "entry {id} is {} bytes, replacement is {} bytes",
                    span.buffer.len(),
                    entry.buffer().len()
                ),
            ));
        }
    }

    for (id, entry) in entries {
        if let Some(span) = spans.iter().find(|s| s.id == *id) {
            let start = RECORD_HEADER_LEN + span.buffer.start;
            region[start..start + span.buffer.len()].copy_from_slice(entry.buffer());
        }
    }
    patch_checksum(&mut region);

    let mut out = OpenOptions::new()
        .write(true)
        .open(file)
        .map_err(|e| StreamError::io(format!("opening {path_str}"), e))?;
    out.seek(SeekFrom::Start(metadata_offset))
        .map_err(|e| StreamError::io(format!("seeking {path_str}"), e))?;
    out.write_all(&region)
        .map_err(|e| StreamError::io(format!("writing {path_str}"), e))?;
    out.sync_all()
        .map_err(|e| StreamError::io(format!("syncing {path_str}"), e))?;

    tracing::debug!(file = %path_str, entries = entries.len(), "modified metadata in place");
    Ok(())
}

/// Validate a sealed file and copy out its footer region.
fn read_footer_region(file: &Path) -> Result<(u64, Vec<u8>)> {
    let reader = Reader::open(file)?;
    if reader.is_recovered() {
        return Err(StreamError::usage("metadata", "file has no footer"));
    }
    let metadata_offset = reader.data_end();
    let mapped = MappedFile::open(file)?;
    let len = mapped.len() as u64;
    let region = mapped.slice(metadata_offset, len - metadata_offset)?.to_vec();
    Ok((metadata_offset, region))
}
