// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Rewriting stream files.
//!
//! A rewrite replays a file through a fresh [`Writer`]: every metadata
//! entry keeps its id, stream info is derived anew and every message is
//! saved again. This converts between layouts, changes the chunk size,
//! adds a message index to files written without one, and turns a
//! recovered partial file into a sealed one.

use std::path::{Path, PathBuf};

use crate::core::{Result, StreamError};
use crate::io::reader::ReaderBuilder;
use crate::io::writer::{Writer, WriterConfig};
use crate::metadata::{StreamDescriptor, StreamingInfo};

/// Options for rewrite operations.
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Configuration of the output writer. A missing file id keeps the
    /// input's file id.
    pub writer: WriterConfig,
    /// Accept an unsealed streaming-layout input
    pub recover: bool,
}

impl RewriteOptions {
    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_recover(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }
}

/// Statistics from a rewrite operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Metadata entries copied (stream info excluded)
    pub metadata_count: u64,
    /// Streams declared in the output
    pub stream_count: u64,
    /// Messages replayed
    pub message_count: u64,
    /// Chunks in the output
    pub chunk_count: u64,
    /// Whether the input had to be recovered
    pub recovered: bool,
}

/// Rewrite `input` into `output`.
pub fn rewrite<P1, P2>(input: P1, output: P2, options: &RewriteOptions) -> Result<RewriteStats>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    rewrite_with_progress(input, output, options, |_| {})
}

/// Rewrite `input` into `output`, calling `progress` with the number of
/// messages replayed so far.
pub fn rewrite_with_progress<P1, P2, F>(
    input: P1,
    output: P2,
    options: &RewriteOptions,
    mut progress: F,
) -> Result<RewriteStats>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    F: FnMut(u64),
{
    let input = input.as_ref();
    let output = output.as_ref();
    if same_file(input, output) {
        return Err(StreamError::usage(
            "rewrite",
            "input and output are the same file, use reindex_in_place",
        ));
    }

    let reader = ReaderBuilder::new()
        .path(input)
        .recover(options.recover)
        .build()?;

    let mut config = options.writer.clone();
    if config.file_id.is_none() {
        config.file_id = Some(reader.file_id().to_string());
    }
    let mut writer = Writer::with_config(output, config)?;
    let mut stats = RewriteStats {
        recovered: reader.is_recovered(),
        ..RewriteStats::default()
    };

    // Sources before the streams that reference them.
    let (streams, others): (Vec<_>, Vec<_>) = reader
        .metadata_store()
        .iter()
        .filter(|entry| !entry.is::<StreamingInfo>())
        .partition(|entry| entry.is::<StreamDescriptor>());
    for entry in others.into_iter().chain(streams) {
        writer.add_metadata_entry_with_id(entry.id(), entry.clone())?;
        stats.metadata_count += 1;
    }
    stats.stream_count = reader.streams().len() as u64;

    for message in reader.messages() {
        let message = message?;
        writer.save(message.stream_id, message.ts, &message.data)?;
        stats.message_count += 1;
        progress(stats.message_count);
    }
    writer.close()?;
    stats.chunk_count = writer.chunk_count() as u64;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        layout = %writer.layout(),
        messages = stats.message_count,
        chunks = stats.chunk_count,
        "rewrote file"
    );
    Ok(stats)
}

/// Rewrite a file over itself through a temporary file in the same
/// directory.
pub fn reindex_in_place<P: AsRef<Path>>(path: P, options: &RewriteOptions) -> Result<RewriteStats> {
    let path = path.as_ref();
    let tmp = temp_sibling(path);
    let stats = match rewrite(path, &tmp, options) {
        Ok(stats) => stats,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
    };
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        StreamError::io(format!("replacing {}", path.display()), e)
    })?;
    Ok(stats)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "robostream".to_string());
    path.with_file_name(format!(".{name}.reindex.tmp"))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
