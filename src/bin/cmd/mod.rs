// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod backup;
mod info;
mod parse;
mod reindex;

pub use backup::{BackupCmd, RestoreCmd};
pub use info::InfoCmd;
pub use parse::ParseCmd;
pub use reindex::ReindexCmd;
