// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Info command - dump file metadata as JSON.

use std::path::PathBuf;

use clap::Args;
use serde_json::{json, Value};

use crate::common::{open_reader, Result};
use robostream::Reader;

/// Dump file metadata as JSON.
#[derive(Args, Clone, Debug)]
pub struct InfoCmd {
    /// Input file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Only list entry ids, types and sizes
    #[arg(long)]
    short: bool,

    /// Recover an unsealed streaming file
    #[arg(long)]
    recover: bool,
}

impl InfoCmd {
    pub fn run(self) -> Result<()> {
        let reader = open_reader(&self.input, self.recover)?;
        let doc = info_json(&reader, self.short);
        println!("{}", serde_json::to_string_pretty(&doc)?);
        Ok(())
    }
}

fn info_json(reader: &Reader, short: bool) -> Value {
    let metadata: Vec<Value> = reader
        .metadata_store()
        .iter()
        .map(|entry| {
            if short {
                json!({
                    "id": entry.id(),
                    "type": entry.type_name(),
                    "size": entry.buffer().len(),
                })
            } else {
                entry.to_json(reader.registry())
            }
        })
        .collect();

    json!({
        "file": reader.path().display().to_string(),
        "file_id": reader.file_id(),
        "version": reader.version(),
        "layout": reader.layout().as_str(),
        "recovered": reader.is_recovered(),
        "start_ts": reader.start_ts(),
        "end_ts": reader.end_ts(),
        "message_count": reader.message_count(),
        "chunk_count": reader.chunk_count(),
        "metadata": metadata,
    })
}
