// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Parse command - summarize chunks, streams and messages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;

use crate::common::{format_bytes, format_duration, format_timestamp, open_reader, Result};
use robostream::Reader;

/// Summarize chunks, streams and messages.
#[derive(Args, Clone, Debug)]
pub struct ParseCmd {
    /// Input file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Walk chunks in file order instead of merging by timestamp
    #[arg(long)]
    standard: bool,

    /// Print every message
    #[arg(short, long)]
    messages: bool,

    /// Recover an unsealed streaming file
    #[arg(long)]
    recover: bool,
}

impl ParseCmd {
    pub fn run(self) -> Result<()> {
        let reader = open_reader(&self.input, self.recover)?;

        println!("=== {} ===", self.input.display());
        println!("File id:    {}", reader.file_id());
        println!("Layout:     {}", reader.layout());
        println!("Version:    {}", reader.version());
        if reader.is_recovered() {
            println!("Recovered:  yes");
        }
        if let (Some(start), Some(end)) = (reader.start_ts(), reader.end_ts()) {
            println!("Start:      {}", format_timestamp(start));
            println!("End:        {}", format_timestamp(end));
            println!("Duration:   {}", format_duration(end.saturating_sub(start)));
        }
        println!("Metadata:   {} entries", reader.metadata_store().len());

        print_streams(&reader);
        print_chunks(&reader);

        let counts = if self.standard {
            walk_chunks(&reader, self.messages)?
        } else {
            walk_merged(&reader, self.messages)?
        };
        let total: u64 = counts.values().sum();
        println!();
        println!("Parsed {total} messages");
        for (stream_id, count) in &counts {
            println!("  stream {stream_id}: {count}");
        }
        Ok(())
    }
}

fn print_streams(reader: &Reader) {
    println!();
    println!("Streams ({}):", reader.streams().len());
    for (id, stream) in reader.streams() {
        let stats = reader.stream_stats(*id);
        let count = stats.map(|s| s.message_count).unwrap_or(0);
        print!(
            "  [{id}] {} (schema {}, source {}, {} fields) {count} msgs",
            stream.name,
            stream.type_id,
            stream.source_meta_id,
            stream.fields.len()
        );
        if let Some(stats) = stats.filter(|s| s.message_count > 0) {
            print!(", avg {}", format_bytes(stats.message_avg_size as u64));
        }
        println!();
    }
}

fn print_chunks(reader: &Reader) {
    println!();
    println!("Chunks ({}):", reader.chunk_count());
    for (idx, chunk) in reader.chunks().enumerate() {
        println!(
            "  #{idx} @{} {} [{}, {}] {} msgs, streams {:?}",
            chunk.offset,
            format_bytes(chunk.length),
            chunk.start_ts,
            chunk.end_ts,
            chunk.message_count,
            chunk.stream_ids
        );
    }
}

fn walk_chunks(reader: &Reader, verbose: bool) -> Result<BTreeMap<u32, u64>> {
    let mut counts = BTreeMap::new();
    for (idx, chunk) in reader.chunks().enumerate() {
        let body = reader.read_chunk(chunk)?;
        for message in &body.messages {
            if verbose {
                println!(
                    "chunk {idx}: stream {} ts {} ({} bytes)",
                    message.stream_id,
                    message.ts,
                    message.data.len()
                );
            }
            *counts.entry(message.stream_id).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn walk_merged(reader: &Reader, verbose: bool) -> Result<BTreeMap<u32, u64>> {
    let mut counts = BTreeMap::new();
    for message in reader.messages() {
        let message = message?;
        if verbose {
            println!(
                "stream {} ts {} ({} bytes)",
                message.stream_id,
                message.ts,
                message.data.len()
            );
        }
        *counts.entry(message.stream_id).or_insert(0) += 1;
    }
    Ok(counts)
}
