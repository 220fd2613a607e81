// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout robostream.
//!
//! - [`StreamError`] - Error taxonomy shared by every module
//! - [`bytes`] - Little-endian cursor and buffer helpers
//! - [`TypeRegistry`] - Metadata type and message schema registry

pub mod bytes;
pub mod error;
pub mod registry;

pub use error::{Result, StreamError};
pub use registry::{MetadataCodec, TypeRegistry};

/// Message timestamp, in nanoseconds.
pub type Timestamp = u64;
