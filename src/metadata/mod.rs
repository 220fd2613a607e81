// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata model: typed records stored once per file.
//!
//! A metadata entry is persisted as the triplet `{id, type, buffer}`:
//! - `id` is unique within a file and is used to link entries to each
//!   other and messages to their streams
//! - `type` is a stable string naming the concrete schema
//! - `buffer` is the encoded payload of the concrete kind
//!
//! Concrete kinds implement [`MetadataKind`], which pairs a type string
//! with an `(encode, decode)` pair. New kinds are made readable by
//! registering them in a [`TypeRegistry`](crate::core::registry::TypeRegistry);
//! the engine itself never needs to know about them.

pub mod kinds;
pub mod store;

pub use kinds::{
    ChunkStreams, Extrinsics, FieldSpec, LidarSensor, SensorInfo, StreamDescriptor, StreamStats,
    StreamingInfo, IDENTITY, SCHEMA_IMU, SCHEMA_LIDAR_SCAN, SCHEMA_RAW,
};
pub use store::MetadataStore;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::registry::TypeRegistry;
use crate::core::Result;

/// A concrete metadata schema.
///
/// Implementations are plain values: encoding must be deterministic and
/// `decode(encode(x))` must be behaviorally equivalent to `x`.
pub trait MetadataKind: Clone + fmt::Debug + Serialize + Send + Sync + 'static {
    /// Stable type string used as the registry key and persisted in files.
    const TYPE: &'static str;

    /// Serialize to the persisted buffer representation.
    fn encode(&self) -> Vec<u8>;

    /// Reconstruct from a persisted buffer.
    fn decode(buf: &[u8]) -> Result<Self>;
}

/// Metadata record as held by a [`MetadataStore`].
///
/// An entry always carries its encoded buffer. Entries built from a native
/// value additionally keep that value, so converting back to the same kind
/// is a clone instead of a decode. Entries loaded from a file are byte-only
/// and are reconstructed on demand.
#[derive(Clone)]
pub struct MetadataEntry {
    id: u32,
    type_name: String,
    buffer: Vec<u8>,
    native: Option<Arc<dyn Any + Send + Sync>>,
}

impl MetadataEntry {
    /// Capture a native value. The id is assigned when added to a store.
    pub fn new<K: MetadataKind>(value: K) -> Self {
        let buffer = value.encode();
        Self {
            id: 0,
            type_name: K::TYPE.to_string(),
            buffer,
            native: Some(Arc::new(value)),
        }
    }

    /// Wrap an already-encoded buffer.
    pub fn from_raw(type_name: impl Into<String>, buffer: Vec<u8>) -> Self {
        Self {
            id: 0,
            type_name: type_name.into(),
            buffer,
            native: None,
        }
    }

    /// Unique id within the file, 0 if not yet stored.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Persisted type string.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Persisted buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether the entry still holds the value it was built from.
    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }

    /// Whether the entry is of kind `K`.
    pub fn is<K: MetadataKind>(&self) -> bool {
        self.type_name == K::TYPE
    }

    /// Convert to the concrete kind `K`.
    ///
    /// Returns `None` when the entry is of another kind or its buffer does
    /// not decode.
    pub fn as_kind<K: MetadataKind>(&self) -> Option<K> {
        if !self.is::<K>() {
            return None;
        }
        if let Some(value) = self
            .native
            .as_ref()
            .and_then(|native| native.downcast_ref::<K>())
        {
            return Some(value.clone());
        }
        match K::decode(&self.buffer) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    id = self.id,
                    type_name = %self.type_name,
                    error = %e,
                    "metadata buffer failed to decode"
                );
                None
            }
        }
    }

    /// Reconstruct through the registry's decode table.
    ///
    /// Unregistered types (or buffers that fail to decode) come back as an
    /// [`UnknownMetadata`] placeholder rather than an error.
    pub fn decode_with(&self, registry: &TypeRegistry) -> DecodedMetadata {
        if let Some(native) = &self.native {
            return DecodedMetadata::Known(Arc::clone(native));
        }
        match registry.codec(&self.type_name) {
            Some(codec) => match (codec.decode)(&self.buffer) {
                Ok(value) => DecodedMetadata::Known(value),
                Err(e) => {
                    tracing::warn!(id = self.id, type_name = %self.type_name, error = %e,
                        "registered metadata failed to decode");
                    DecodedMetadata::Unknown(self.unknown())
                }
            },
            None => DecodedMetadata::Unknown(self.unknown()),
        }
    }

    /// JSON view used by metadata dumps.
    pub fn to_json(&self, registry: &TypeRegistry) -> serde_json::Value {
        let value = registry
            .codec(&self.type_name)
            .and_then(|codec| (codec.to_json)(&self.buffer).ok());
        match value {
            Some(v) => serde_json::json!({
                "id": self.id,
                "type": self.type_name,
                "value": v,
            }),
            None => serde_json::json!({
                "id": self.id,
                "type": self.type_name,
                "buffer_len": self.buffer.len(),
            }),
        }
    }

    fn unknown(&self) -> UnknownMetadata {
        UnknownMetadata {
            id: self.id,
            type_name: self.type_name.clone(),
            len: self.buffer.len(),
        }
    }

    pub(crate) fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }
}

impl fmt::Debug for MetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataEntry")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("len", &self.buffer.len())
            .field("native", &self.native.is_some())
            .finish()
    }
}

impl fmt::Display for MetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MetadataEntry: [{}] {} ({} bytes)",
            self.id,
            self.type_name,
            self.buffer.len()
        )
    }
}

/// Entries compare by persisted content, not by how they were built.
impl PartialEq for MetadataEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.type_name == other.type_name && self.buffer == other.buffer
    }
}

/// Result of decoding an entry through the registry.
#[derive(Clone)]
pub enum DecodedMetadata {
    /// Registered kind, reconstructed value
    Known(Arc<dyn Any + Send + Sync>),
    /// Unregistered kind, kept as an opaque reference
    Unknown(UnknownMetadata),
}

impl DecodedMetadata {
    /// Concrete value if the decoded entry is of kind `K`.
    pub fn downcast<K: MetadataKind>(&self) -> Option<K> {
        match self {
            DecodedMetadata::Known(value) => value.downcast_ref::<K>().cloned(),
            DecodedMetadata::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DecodedMetadata::Unknown(_))
    }
}

impl fmt::Debug for DecodedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedMetadata::Known(_) => f.debug_tuple("Known").field(&"<value>").finish(),
            DecodedMetadata::Unknown(u) => f.debug_tuple("Unknown").field(u).finish(),
        }
    }
}

/// Placeholder for a metadata entry whose type has no registered decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetadata {
    pub id: u32,
    pub type_name: String,
    pub len: usize,
}
