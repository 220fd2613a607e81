// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builder pattern for opening readers.
//!
//! The `ReaderBuilder` provides a fluent API for configuring how a file is
//! opened before opening it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::registry::{self, TypeRegistry};
use crate::core::{Result, StreamError};

use super::Reader;

/// Configuration for opening a reader.
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// Path to the file to read
    pub path: PathBuf,
    /// Rebuild the index of an unsealed streaming-layout file
    pub recover: bool,
    /// Registry used for structured metadata access (None = global snapshot)
    pub registry: Option<Arc<TypeRegistry>>,
}

/// Builder for opening readers.
///
/// # Example
///
/// ```rust,no_run
/// use robostream::io::ReaderBuilder;
///
/// // Strict open: the file must carry a valid footer
/// let reader = ReaderBuilder::new()
///     .path("capture.rsf")
///     .build()?;
///
/// // Salvage what a crashed streaming writer left behind
/// let reader = ReaderBuilder::new()
///     .path("crashed.rsf")
///     .recover(true)
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReaderBuilder {
    config: ReaderConfig,
}

impl ReaderBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to the file.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.path = path.as_ref().to_path_buf();
        self
    }

    /// Allow opening an unsealed streaming-layout file.
    pub fn recover(mut self, recover: bool) -> Self {
        self.config.recover = recover;
        self
    }

    /// Use `registry` instead of a snapshot of the process-wide registry.
    pub fn registry(mut self, registry: TypeRegistry) -> Self {
        self.config.registry = Some(Arc::new(registry));
        self
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Open the reader.
    pub fn build(self) -> Result<Reader> {
        if self.config.path.as_os_str().is_empty() {
            return Err(StreamError::usage("ReaderBuilder", "path is not set"));
        }
        let registry = self
            .config
            .registry
            .unwrap_or_else(|| Arc::new(registry::snapshot()));
        Reader::open_with(&self.config.path, self.config.recover, registry)
    }
}
