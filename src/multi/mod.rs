// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Multi-sensor convenience layer.
//!
//! [`MultiWriter`] maps sensor indices `0..N` onto lidar scan streams;
//! [`ScanReader`] maps them back.
//!
//! # Example
//!
//! ```rust,no_run
//! use robostream::multi::{MultiWriter, Scan};
//! use robostream::io::WriterConfig;
//! use robostream::metadata::{FieldSpec, SensorInfo};
//!
//! let sensors = vec![SensorInfo::default(), SensorInfo::default()];
//! let mut writer = MultiWriter::create("scans.rsf", sensors, WriterConfig::default(), None)?;
//!
//! let scan = Scan::new(1_000, 1024, 64).with_field(FieldSpec::new("RANGE", 4), vec![0; 1024 * 64 * 4])?;
//! writer.save(0, &scan)?;
//! writer.save(1, &scan)?;
//! writer.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod reader;
pub mod scan;
pub mod writer;

pub use reader::ScanReader;
pub use scan::{Scan, ScanField};
pub use writer::MultiWriter;
