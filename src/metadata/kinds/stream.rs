// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Stream descriptor metadata.
//!
//! A stream is defined by its descriptor entry: the entry id doubles as the
//! `stream_id` carried by every message of the stream.

use serde::{Deserialize, Serialize};

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::Result;
use crate::metadata::MetadataKind;

/// Message schema id for opaque byte payloads.
pub const SCHEMA_RAW: u16 = 1;
/// Message schema id for lidar scans.
pub const SCHEMA_LIDAR_SCAN: u16 = 2;
/// Message schema id for inertial samples.
pub const SCHEMA_IMU: u16 = 3;

/// One persisted field of a stream's messages.
///
/// The engine treats the field set as producer-supplied schema; only the
/// multi-sensor layer interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name (e.g. "RANGE")
    pub name: String,
    /// Bytes per element
    pub element_size: u8,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, element_size: u8) -> Self {
        Self {
            name: name.into(),
            element_size,
        }
    }
}

/// Descriptor of a logical channel of one message kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Human readable name (e.g. "/os_sensor/lidar_scan")
    pub name: String,
    /// Message schema id, see the registry's message schema table
    pub type_id: u16,
    /// Id of the metadata entry describing the source device (0 = none)
    pub source_meta_id: u32,
    /// Persisted field set; empty when not fixed
    pub fields: Vec<FieldSpec>,
}

impl StreamDescriptor {
    pub fn new(name: impl Into<String>, type_id: u16, source_meta_id: u32) -> Self {
        Self {
            name: name.into(),
            type_id,
            source_meta_id,
            fields: Vec::new(),
        }
    }

    /// Descriptor for a lidar scan stream sourced from `sensor_meta_id`.
    pub fn lidar_scan(sensor_meta_id: u32, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: "lidar_scan".to_string(),
            type_id: SCHEMA_LIDAR_SCAN,
            source_meta_id: sensor_meta_id,
            fields,
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }
}

impl MetadataKind for StreamDescriptor {
    const TYPE: &'static str = "robostream/v1/StreamDescriptor";

    fn encode(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(32 + self.name.len() + self.fields.len() * 16);
        buf.put_str(&self.name);
        buf.put_u16(self.type_id);
        buf.put_u32(self.source_meta_id);
        buf.put_u32(self.fields.len() as u32);
        for field in &self.fields {
            buf.put_str(&field.name);
            buf.put_u8(field.element_size);
        }
        buf.into_vec()
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        let name = cursor.read_string()?;
        let type_id = cursor.read_u16()?;
        let source_meta_id = cursor.read_u32()?;
        let count = cursor.read_u32()? as usize;
        // Each field needs at least 5 bytes; guards against absurd counts.
        let mut fields = Vec::with_capacity(count.min(cursor.remaining() / 5));
        for _ in 0..count {
            let name = cursor.read_string()?;
            let element_size = cursor.read_u8()?;
            fields.push(FieldSpec { name, element_size });
        }
        Ok(Self {
            name,
            type_id,
            source_meta_id,
            fields,
        })
    }
}
