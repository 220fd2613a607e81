// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata type registry.
//!
//! Maps persisted type strings to a pair of plain function pointers
//! (`decode`, `to_json`), and numeric message schema ids to names. Nothing
//! is registered implicitly: built-in kinds are seeded when the registry is
//! created, everything else goes through an explicit `register` call made
//! during process setup, before files using the type are opened.
//!
//! The process-wide instance is reached through [`global`]. Readers take a
//! snapshot of it when they open a file, so registrations made afterwards do
//! not affect readers that are already open.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::{Result, StreamError};
use crate::metadata::kinds::{
    Extrinsics, LidarSensor, StreamDescriptor, StreamingInfo, SCHEMA_IMU, SCHEMA_LIDAR_SCAN,
    SCHEMA_RAW,
};
use crate::metadata::{DecodedMetadata, MetadataEntry, MetadataKind};

/// Type strings in this namespace belong to the built-in kinds.
pub const RESERVED_TYPE_PREFIX: &str = "robostream/";

/// Message schema id that never names a schema.
pub const RESERVED_SCHEMA_ID: u16 = 0;

/// Decode functions for one metadata type.
#[derive(Debug, Clone, Copy)]
pub struct MetadataCodec {
    /// Reconstruct the native value from a persisted buffer
    pub decode: fn(&[u8]) -> Result<Arc<dyn Any + Send + Sync>>,
    /// Render a persisted buffer as JSON
    pub to_json: fn(&[u8]) -> Result<serde_json::Value>,
}

impl MetadataCodec {
    /// Codec for a concrete kind.
    pub fn of<K: MetadataKind>() -> Self {
        Self {
            decode: decode_native::<K>,
            to_json: decode_json::<K>,
        }
    }
}

fn decode_native<K: MetadataKind>(buf: &[u8]) -> Result<Arc<dyn Any + Send + Sync>> {
    Ok(Arc::new(K::decode(buf)?))
}

fn decode_json<K: MetadataKind>(buf: &[u8]) -> Result<serde_json::Value> {
    let value = K::decode(buf)?;
    serde_json::to_value(&value).map_err(|e| StreamError::decode(K::TYPE, e.to_string()))
}

/// Type string and message schema tables.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    codecs: BTreeMap<String, MetadataCodec>,
    message_schemas: BTreeMap<u16, String>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in metadata kinds and message
    /// schemas.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.codecs.insert(
            LidarSensor::TYPE.to_string(),
            MetadataCodec::of::<LidarSensor>(),
        );
        registry.codecs.insert(
            Extrinsics::TYPE.to_string(),
            MetadataCodec::of::<Extrinsics>(),
        );
        registry.codecs.insert(
            StreamDescriptor::TYPE.to_string(),
            MetadataCodec::of::<StreamDescriptor>(),
        );
        registry.codecs.insert(
            StreamingInfo::TYPE.to_string(),
            MetadataCodec::of::<StreamingInfo>(),
        );
        registry
            .message_schemas
            .insert(SCHEMA_RAW, "raw".to_string());
        registry
            .message_schemas
            .insert(SCHEMA_LIDAR_SCAN, "lidar_scan".to_string());
        registry
            .message_schemas
            .insert(SCHEMA_IMU, "imu".to_string());
        registry
    }

    /// Register a metadata kind under its type string.
    pub fn register<K: MetadataKind>(&mut self) -> Result<()> {
        self.register_codec(K::TYPE, MetadataCodec::of::<K>())
    }

    /// Register decode functions for a type string.
    ///
    /// Empty, reserved and already registered type strings are rejected and
    /// leave the registry untouched.
    pub fn register_codec(&mut self, type_name: &str, codec: MetadataCodec) -> Result<()> {
        if type_name.is_empty() {
            return Err(StreamError::schema(type_name, "empty type string"));
        }
        if type_name.starts_with(RESERVED_TYPE_PREFIX) {
            return Err(StreamError::schema(
                type_name,
                format!("'{RESERVED_TYPE_PREFIX}' namespace is reserved"),
            ));
        }
        if self.codecs.contains_key(type_name) {
            return Err(StreamError::schema(type_name, "type already registered"));
        }
        tracing::debug!(type_name, "registered metadata type");
        self.codecs.insert(type_name.to_string(), codec);
        Ok(())
    }

    /// Register a message schema id.
    ///
    /// Id 0 is reserved; ids and names must both be unused.
    pub fn register_message_schema(&mut self, id: u16, name: &str) -> Result<()> {
        if id == RESERVED_SCHEMA_ID {
            return Err(StreamError::schema(
                format!("schema #{id} ({name})"),
                "message schema id 0 is reserved",
            ));
        }
        if let Some(existing) = self.message_schemas.get(&id) {
            return Err(StreamError::schema(
                format!("schema #{id} ({name})"),
                format!("id already used by '{existing}'"),
            ));
        }
        if self.message_schema_id(name).is_some() {
            return Err(StreamError::schema(
                format!("schema #{id} ({name})"),
                "name already registered",
            ));
        }
        self.message_schemas.insert(id, name.to_string());
        Ok(())
    }

    pub fn codec(&self, type_name: &str) -> Option<MetadataCodec> {
        self.codecs.get(type_name).copied()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }

    /// Registered type strings, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        self.codecs.keys().map(String::as_str).collect()
    }

    /// Number of registered metadata types.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Name of message schema `id`.
    pub fn message_schema(&self, id: u16) -> Option<&str> {
        self.message_schemas.get(&id).map(String::as_str)
    }

    /// Id of the message schema called `name`.
    pub fn message_schema_id(&self, name: &str) -> Option<u16> {
        self.message_schemas
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    /// Decode an entry through this registry's table.
    pub fn decode(&self, entry: &MetadataEntry) -> DecodedMetadata {
        entry.decode_with(self)
    }
}

static GLOBAL_REGISTRY: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

/// The process-wide registry, seeded with built-ins on first use.
pub fn global() -> &'static RwLock<TypeRegistry> {
    GLOBAL_REGISTRY.get_or_init(|| RwLock::new(TypeRegistry::with_builtins()))
}

// A panic while holding the lock cannot leave the maps half-updated, so
// poisoned locks are recovered.
fn read_global() -> RwLockReadGuard<'static, TypeRegistry> {
    global().read().unwrap_or_else(|e| e.into_inner())
}

fn write_global() -> RwLockWriteGuard<'static, TypeRegistry> {
    global().write().unwrap_or_else(|e| e.into_inner())
}

/// Copy of the current process-wide registry.
pub fn snapshot() -> TypeRegistry {
    read_global().clone()
}

/// Register a metadata kind process-wide.
pub fn register<K: MetadataKind>() -> Result<()> {
    write_global().register::<K>()
}

/// Register a message schema id process-wide.
pub fn register_message_schema(id: u16, name: &str) -> Result<()> {
    write_global().register_message_schema(id, name)
}

/// Drop every process-wide registration except the built-ins.
pub fn reset() {
    *write_global() = TypeRegistry::with_builtins();
}
