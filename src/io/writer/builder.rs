// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Writer configuration and builder.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Result, StreamError};
use crate::io::constants::DEFAULT_CHUNK_SIZE;
use crate::io::layout::ChunksLayout;

use super::Writer;

/// Configuration for creating a writer.
///
/// Deserializable from TOML, every field optional:
///
/// ```toml
/// chunk_size = 1048576
/// layout = "standard"
/// message_index = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Chunk flush threshold in bytes (0 = default 4MB)
    pub chunk_size: usize,
    /// Chunk layout policy
    pub layout: ChunksLayout,
    /// Persist every message timestamp for O(log n) index lookups
    pub message_index: bool,
    /// File id stored in the header (None = random UUID)
    pub file_id: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            layout: ChunksLayout::default(),
            message_index: true,
            file_id: None,
        }
    }
}

impl WriterConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StreamError::usage("WriterConfig", e.to_string()))
    }

    /// Load a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StreamError::io(format!("reading {}", path.display()), e))?;
        Self::from_toml(&text)
    }

    /// Chunk threshold with 0 resolved to the default.
    pub fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}

/// Builder for creating writers.
#[derive(Debug, Clone, Default)]
pub struct WriterBuilder {
    path: PathBuf,
    config: WriterConfig,
}

impl WriterBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to the output file.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the chunk flush threshold in bytes.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the chunk layout.
    pub fn layout(mut self, layout: ChunksLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Enable or disable the per-message timestamp index.
    pub fn message_index(mut self, enabled: bool) -> Self {
        self.config.message_index = enabled;
        self
    }

    /// Set the file id written to the header.
    pub fn file_id(mut self, id: impl Into<String>) -> Self {
        self.config.file_id = Some(id.into());
        self
    }

    /// Build the writer.
    pub fn build(self) -> Result<Writer> {
        if self.path.as_os_str().is_empty() {
            return Err(StreamError::usage("WriterBuilder", "path is not set"));
        }
        Writer::with_config(&self.path, self.config)
    }
}
