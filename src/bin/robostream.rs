// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Robostream CLI
//!
//! Command-line tool for inspecting and maintaining sensor stream files.
//!
//! ## Usage
//!
//! ```sh
//! # Dump metadata as JSON
//! robostream info capture.rsf
//!
//! # Summarize chunks and messages
//! robostream parse capture.rsf
//!
//! # Save and restore the metadata footer
//! robostream backup capture.rsf capture.rsbak
//! robostream restore capture.rsf capture.rsbak
//!
//! # Rewrite with a different layout
//! robostream reindex capture.rsf --layout standard --output standard.rsf
//! ```

mod cmd;
mod common;

use std::process;

use clap::{Parser, Subcommand};
use cmd::{BackupCmd, InfoCmd, ParseCmd, ReindexCmd, RestoreCmd};
use common::Result;

/// Robostream - chunked sensor stream container toolkit
#[derive(Parser, Clone)]
#[command(name = "robostream")]
#[command(about = "Inspect and maintain chunked sensor stream files", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Log filter (e.g. "debug", "robostream=trace"); overrides RUST_LOG
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Dump file metadata as JSON
    Info(InfoCmd),

    /// Summarize chunks, streams and messages
    Parse(ParseCmd),

    /// Save the metadata footer to a backup file
    Backup(BackupCmd),

    /// Replace the metadata footer from a backup file
    Restore(RestoreCmd),

    /// Rewrite a file, rebuilding its index and metadata
    Reindex(ReindexCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    common::init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Info(cmd) => cmd.run(),
        Commands::Parse(cmd) => cmd.run(),
        Commands::Backup(cmd) => cmd.run(),
        Commands::Restore(cmd) => cmd.run(),
        Commands::Reindex(cmd) => cmd.run(),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
