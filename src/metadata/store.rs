// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The set of metadata entries of one file.
//!
//! Ids are allocated monotonically starting at 1 and never reused. Once
//! `u32::MAX` has been handed out the id space is exhausted and further
//! automatic allocations fail. The store serializes to a flat table:
//!
//! ```text
//! count:u32 | (id:u32 | type:str | buffer:bytes) * count
//! ```

use std::collections::BTreeMap;
use std::ops::Range;

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::{Result, StreamError};

use super::{MetadataEntry, MetadataKind};

/// Position of one entry inside a serialized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpan {
    pub id: u32,
    pub type_name: String,
    /// Byte range of the entry buffer within the table
    pub buffer: Range<usize>,
}

/// Id-keyed collection of metadata entries.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataStore {
    entries: BTreeMap<u32, MetadataEntry>,
    /// Always above every stored id; `u32::MAX + 1` when exhausted
    next_id: u64,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Add a native value, returning its assigned id.
    pub fn add<K: MetadataKind>(&mut self, value: K) -> Result<u32> {
        self.add_entry(MetadataEntry::new(value))
    }

    /// Add a copy of an entry under a freshly assigned id.
    ///
    /// Any id the entry already carries is ignored. Fails with a usage
    /// error when no id above the highest one in use is left.
    pub fn add_entry(&mut self, entry: MetadataEntry) -> Result<u32> {
        let id = self.next_id().ok_or_else(|| {
            StreamError::usage("add_metadata", "metadata id space exhausted")
        })?;
        self.next_id += 1;
        self.entries.insert(id, entry.with_id(id));
        Ok(id)
    }

    /// Add an entry under a caller-chosen id.
    ///
    /// Fails with a usage error when `id` is 0 or already taken. Later
    /// automatic ids continue above the highest id seen.
    pub fn insert_with_id(&mut self, id: u32, entry: MetadataEntry) -> Result<()> {
        if id == 0 {
            return Err(StreamError::usage(
                "insert_with_id",
                "metadata id 0 is reserved",
            ));
        }
        if self.entries.contains_key(&id) {
            return Err(StreamError::usage(
                "insert_with_id",
                format!("metadata id {id} already in use"),
            ));
        }
        self.entries.insert(id, entry.with_id(id));
        self.next_id = self.next_id.max(u64::from(id) + 1);
        Ok(())
    }

    /// Id the next [`add`](Self::add) will assign, `None` once the id
    /// space is exhausted.
    pub fn next_id(&self) -> Option<u32> {
        u32::try_from(self.next_id).ok()
    }

    pub fn get(&self, id: u32) -> Option<&MetadataEntry> {
        self.entries.get(&id)
    }

    /// Entry `id` converted to kind `K`.
    pub fn get_kind<K: MetadataKind>(&self, id: u32) -> Option<K> {
        self.entries.get(&id).and_then(|e| e.as_kind::<K>())
    }

    /// First entry (lowest id) of kind `K`.
    pub fn first<K: MetadataKind>(&self) -> Option<K> {
        self.entries
            .values()
            .filter(|e| e.is::<K>())
            .find_map(|e| e.as_kind::<K>())
    }

    /// Every entry of kind `K`, keyed by id.
    pub fn find<K: MetadataKind>(&self) -> BTreeMap<u32, K> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is::<K>())
            .filter_map(|(id, e)| e.as_kind::<K>().map(|v| (*id, v)))
            .collect()
    }

    /// Number of entries whose type is `K`.
    pub fn count<K: MetadataKind>(&self) -> usize {
        self.entries.values().filter(|e| e.is::<K>()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.values()
    }

    /// Serialize to the flat metadata table.
    pub fn serialize(&self) -> Vec<u8> {
        let size: usize = self
            .entries
            .values()
            .map(|e| 12 + e.type_name().len() + e.buffer().len())
            .sum();
        let mut buf = ByteBuffer::with_capacity(4 + size);
        buf.put_u32(self.entries.len() as u32);
        for entry in self.entries.values() {
            encode_entry(&mut buf, entry);
        }
        buf.into_vec()
    }

    /// Load a store from a serialized table.
    ///
    /// Entries come back byte-only; duplicate or zero ids are rejected.
    pub fn deserialize(table: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(table);
        let count = cursor.read_u32()?;
        let mut store = MetadataStore::new();
        for _ in 0..count {
            let (id, entry) = decode_entry(&mut cursor)?;
            store
                .insert_with_id(id, entry)
                .map_err(|e| StreamError::decode("metadata table", e.to_string()))?;
        }
        Ok(store)
    }
}

/// Append one `id | type | buffer` record body.
pub(crate) fn encode_entry(buf: &mut ByteBuffer, entry: &MetadataEntry) {
    buf.put_u32(entry.id());
    buf.put_str(entry.type_name());
    buf.put_bytes(entry.buffer());
}

/// Read one `id | type | buffer` record body.
pub(crate) fn decode_entry(cursor: &mut ByteCursor<'_>) -> Result<(u32, MetadataEntry)> {
    let id = cursor.read_u32()?;
    let type_name = cursor.read_string()?;
    let buffer = cursor.read_bytes()?.to_vec();
    Ok((id, MetadataEntry::from_raw(type_name, buffer)))
}

/// Locate every entry buffer inside a serialized table.
pub fn entry_spans(table: &[u8]) -> Result<Vec<EntrySpan>> {
    let mut cursor = ByteCursor::new(table);
    let count = cursor.read_u32()?;
    let mut spans = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        let id = cursor.read_u32()?;
        let type_name = cursor.read_string()?;
        let len = cursor.read_u32()? as usize;
        let start = cursor.position();
        cursor.read_raw(len)?;
        spans.push(EntrySpan {
            id,
            type_name,
            buffer: start..start + len,
        });
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Extrinsics, LidarSensor, SensorInfo, StreamDescriptor};

    fn sensor(serial: u64) -> LidarSensor {
        LidarSensor::new(SensorInfo {
            serial_number: serial,
            ..SensorInfo::default()
        })
    }

    #[test]
    fn test_ids_are_monotonic_across_types() {
        let mut store = MetadataStore::new();
        let a = store.add(sensor(1)).unwrap();
        let b = store
            .add(Extrinsics::new(crate::metadata::kinds::IDENTITY, a, "x"))
            .unwrap();
        let c = store.add(sensor(2)).unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(store.get(b).map(|e| e.id()), Some(2));
    }

    #[test]
    fn test_absent_lookups_are_none() {
        let store = MetadataStore::new();
        assert!(store.get(7).is_none());
        assert!(store.first::<LidarSensor>().is_none());
        assert!(store.find::<LidarSensor>().is_empty());
        assert_eq!(store.count::<LidarSensor>(), 0);
    }

    #[test]
    fn test_typed_lookup() {
        let mut store = MetadataStore::new();
        store.add(sensor(10)).unwrap();
        store.add(StreamDescriptor::new("imu", 3, 1)).unwrap();
        store.add(sensor(20)).unwrap();

        assert_eq!(store.count::<LidarSensor>(), 2);
        assert_eq!(store.first::<LidarSensor>().unwrap().info.serial_number, 10);
        let all = store.find::<LidarSensor>();
        assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(all[&3].info.serial_number, 20);
        assert!(store.get_kind::<StreamDescriptor>(1).is_none());
    }

    #[test]
    fn test_manual_ids() {
        let mut store = MetadataStore::new();
        store
            .insert_with_id(5, MetadataEntry::new(sensor(1)))
            .unwrap();
        let err = store
            .insert_with_id(5, MetadataEntry::new(sensor(2)))
            .unwrap_err();
        assert!(err.is_usage());
        assert!(store
            .insert_with_id(0, MetadataEntry::new(sensor(2)))
            .is_err());
        assert_eq!(store.add(sensor(3)).unwrap(), 6);
        assert_eq!(store.get_kind::<LidarSensor>(5).unwrap().info.serial_number, 1);

        // A lower manual id never pulls automatic ids back.
        store
            .insert_with_id(2, MetadataEntry::new(sensor(4)))
            .unwrap();
        assert_eq!(store.add(sensor(5)).unwrap(), 7);
    }

    #[test]
    fn test_id_space_exhaustion() {
        let mut store = MetadataStore::new();
        store
            .insert_with_id(u32::MAX - 1, MetadataEntry::new(sensor(1)))
            .unwrap();
        assert_eq!(store.next_id(), Some(u32::MAX));
        assert_eq!(store.add(sensor(2)).unwrap(), u32::MAX);
        assert_eq!(store.next_id(), None);

        let err = store.add(sensor(3)).unwrap_err();
        assert!(err.is_usage());
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_kind::<LidarSensor>(u32::MAX).unwrap().info.serial_number, 2);

        let mut store = MetadataStore::new();
        store
            .insert_with_id(u32::MAX, MetadataEntry::new(sensor(1)))
            .unwrap();
        assert!(store.add(sensor(2)).unwrap_err().is_usage());
        assert_eq!(store.get_kind::<LidarSensor>(u32::MAX).unwrap().info.serial_number, 1);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut store = MetadataStore::new();
        store.add(sensor(1)).unwrap();
        store
            .add_entry(MetadataEntry::from_raw("vendor/v1/Blob", vec![1, 2, 3]))
            .unwrap();

        let table = store.serialize();
        let loaded = MetadataStore::deserialize(&table).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.next_id(), Some(3));
        assert!(!loaded.get(1).unwrap().is_native());
        assert_eq!(loaded.first::<LidarSensor>(), Some(sensor(1)));
    }

    #[test]
    fn test_duplicate_id_in_table() {
        let mut buf = ByteBuffer::new();
        buf.put_u32(2);
        for _ in 0..2 {
            encode_entry(&mut buf, &MetadataEntry::from_raw("t", vec![]).with_id(1));
        }
        assert!(MetadataStore::deserialize(buf.as_slice()).is_err());
    }

    #[test]
    fn test_entry_spans() {
        let mut store = MetadataStore::new();
        store.add_entry(MetadataEntry::from_raw("a", vec![9, 9])).unwrap();
        store
            .add_entry(MetadataEntry::from_raw("bb", vec![7, 7, 7]))
            .unwrap();
        let table = store.serialize();

        let spans = entry_spans(&table).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].id, 2);
        assert_eq!(spans[1].type_name, "bb");
        assert_eq!(&table[spans[1].buffer.clone()], &[7, 7, 7]);
    }
}
