// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Read-only memory map of a stream file.
//!
//! Slices borrowed from a [`MappedFile`] are tied to its lifetime. A mapped
//! file must not be truncated while mapped; maintenance operations drop
//! their maps before rewriting a file.

use std::fs::File;
use std::path::Path;

use crate::core::{Result, StreamError};

/// Owned memory map plus the path it came from.
pub struct MappedFile {
    mmap: memmap2::Mmap,
    path: String,
}

impl MappedFile {
    /// Map a whole file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        let file = File::open(path_ref)
            .map_err(|e| StreamError::io(format!("opening {path_str}"), e))?;

        // SAFETY: the map is read-only and owned by this value; callers are
        // required not to modify the file while it is mapped.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| StreamError::io(format!("mapping {path_str}"), e))?;

        Ok(Self {
            mmap,
            path: path_str,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Bounds-checked slice of `len` bytes at `offset`.
    pub fn slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let range = usize::try_from(offset)
            .ok()
            .zip(usize::try_from(len).ok())
            .and_then(|(start, len)| Some(start..start.checked_add(len)?))
            .filter(|range| range.end <= self.mmap.len());
        match range {
            Some(range) => Ok(&self.mmap[range]),
            None => Err(StreamError::corruption(
                &self.path,
                format!(
                    "range {offset}+{len} outside file of {} bytes",
                    self.mmap.len()
                ),
            )),
        }
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish()
    }
}
