// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Backup and restore of the metadata footer.

use std::path::PathBuf;

use clap::Args;

use crate::common::{format_bytes, Result};

/// Save the metadata footer to a backup file.
#[derive(Args, Clone, Debug)]
pub struct BackupCmd {
    /// Sealed input file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Backup file to create
    #[arg(value_name = "BACKUP")]
    backup: PathBuf,
}

impl BackupCmd {
    pub fn run(self) -> Result<()> {
        let written = robostream::backup_metadata(&self.input, &self.backup)?;
        println!(
            "Backed up metadata of {} to {} ({})",
            self.input.display(),
            self.backup.display(),
            format_bytes(written)
        );
        Ok(())
    }
}

/// Replace the metadata footer from a backup file.
#[derive(Args, Clone, Debug)]
pub struct RestoreCmd {
    /// File to repair
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Backup created by `robostream backup`
    #[arg(value_name = "BACKUP")]
    backup: PathBuf,
}

impl RestoreCmd {
    pub fn run(self) -> Result<()> {
        robostream::restore_metadata(&self.input, &self.backup)?;
        println!(
            "Restored metadata of {} from {}",
            self.input.display(),
            self.backup.display()
        );
        Ok(())
    }
}
