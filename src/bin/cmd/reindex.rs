// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Reindex command - rewrite a file with a fresh index and metadata.

use std::path::PathBuf;

use clap::Args;

use crate::common::{open_reader, ProgressBar, Result};
use robostream::rewriter::{reindex_in_place, rewrite_with_progress, RewriteOptions, RewriteStats};
use robostream::{ChunksLayout, WriterConfig};

/// Rewrite a file, rebuilding its index and metadata.
#[derive(Args, Clone, Debug)]
pub struct ReindexCmd {
    /// Input file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Write to this file instead of replacing the input
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Chunk layout of the output (standard or streaming)
    #[arg(long)]
    layout: Option<ChunksLayout>,

    /// Chunk flush threshold in bytes
    #[arg(long, value_name = "N")]
    chunk_size: Option<usize>,

    /// Writer configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Recover an unsealed streaming input
    #[arg(long)]
    recover: bool,
}

impl ReindexCmd {
    pub fn run(self) -> Result<()> {
        let mut writer = match &self.config {
            Some(path) => WriterConfig::load(path)?,
            None => WriterConfig::default(),
        };
        if let Some(layout) = self.layout {
            writer.layout = layout;
        }
        if let Some(chunk_size) = self.chunk_size {
            writer.chunk_size = chunk_size;
        }
        let options = RewriteOptions::default()
            .with_writer(writer)
            .with_recover(self.recover);

        let stats = match &self.output {
            Some(output) => {
                let total = open_reader(&self.input, self.recover)?.message_count();
                let progress = ProgressBar::new(total, "Reindexing");
                let stats = rewrite_with_progress(&self.input, output, &options, |done| {
                    progress.set_position(done)
                })?;
                progress.finish_with_message(format!("{} messages", stats.message_count));
                stats
            }
            None => reindex_in_place(&self.input, &options)?,
        };

        print_stats(&self, &stats);
        Ok(())
    }
}

fn print_stats(cmd: &ReindexCmd, stats: &RewriteStats) {
    let target = cmd.output.as_ref().unwrap_or(&cmd.input);
    println!("Reindexed {} -> {}", cmd.input.display(), target.display());
    if stats.recovered {
        println!("  input was recovered from an unsealed file");
    }
    println!("  metadata entries: {}", stats.metadata_count);
    println!("  streams:          {}", stats.stream_count);
    println!("  messages:         {}", stats.message_count);
    println!("  chunks:           {}", stats.chunk_count);
}
