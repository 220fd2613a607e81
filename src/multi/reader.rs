// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Scan reader for multi-sensor files.

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::{Result, StreamError};
use crate::io::reader::Reader;
use crate::metadata::{Extrinsics, LidarSensor, SensorInfo, SCHEMA_LIDAR_SCAN};

use super::scan::Scan;

/// Reads lidar scans and maps them back to sensor indices.
///
/// Sensors are indexed in metadata id order, which is the order they were
/// given to the writer. Stored [`Extrinsics`] entries override the
/// extrinsic of the sensor they reference.
#[derive(Debug)]
pub struct ScanReader {
    reader: Reader,
    sensors: Vec<SensorInfo>,
    /// Stream id -> sensor index
    stream_to_sensor: BTreeMap<u32, usize>,
}

impl ScanReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(Reader::open(path)?)
    }

    pub fn from_reader(reader: Reader) -> Result<Self> {
        let store = reader.metadata_store();
        let found = store.find::<LidarSensor>();
        let index_of: BTreeMap<u32, usize> = found
            .keys()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();
        let mut sensors: Vec<SensorInfo> = found.into_values().map(|s| s.info).collect();

        for (id, extrinsics) in store.find::<Extrinsics>() {
            match index_of.get(&extrinsics.ref_meta_id) {
                Some(&idx) => sensors[idx].extrinsic = extrinsics.matrix,
                None => tracing::warn!(
                    id,
                    ref_meta_id = extrinsics.ref_meta_id,
                    "extrinsics reference no sensor"
                ),
            }
        }

        let mut stream_to_sensor = BTreeMap::new();
        for (stream_id, descriptor) in reader.streams() {
            if descriptor.type_id != SCHEMA_LIDAR_SCAN {
                continue;
            }
            let idx = index_of.get(&descriptor.source_meta_id).ok_or_else(|| {
                StreamError::corruption(
                    reader.path().to_string_lossy(),
                    format!(
                        "lidar stream {stream_id} references missing sensor {}",
                        descriptor.source_meta_id
                    ),
                )
            })?;
            stream_to_sensor.insert(*stream_id, *idx);
        }

        Ok(Self {
            reader,
            sensors,
            stream_to_sensor,
        })
    }

    pub fn sensor_infos(&self) -> &[SensorInfo] {
        &self.sensors
    }

    pub fn sensor_info(&self, idx: usize) -> Option<&SensorInfo> {
        self.sensors.get(idx)
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Lidar stream ids of sensor `idx`.
    pub fn streams_of(&self, idx: usize) -> Vec<u32> {
        self.stream_to_sensor
            .iter()
            .filter(|(_, sensor)| **sensor == idx)
            .map(|(stream, _)| *stream)
            .collect()
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Every scan as `(sensor index, scan)`.
    pub fn scans(&self) -> impl Iterator<Item = Result<(usize, Scan)>> + '_ {
        self.scans_in_range(0, u64::MAX)
    }

    /// Scans with `start <= timestamp <= end`.
    pub fn scans_in_range(
        &self,
        start: u64,
        end: u64,
    ) -> impl Iterator<Item = Result<(usize, Scan)>> + '_ {
        let streams: Vec<u32> = self.stream_to_sensor.keys().copied().collect();
        self.reader
            .messages_for_streams_in_range(&streams, start, end)
            .map(move |message| {
                let message = message?;
                let idx = self
                    .stream_to_sensor
                    .get(&message.stream_id)
                    .copied()
                    .ok_or_else(|| {
                        StreamError::decode("scan", format!("stream {} is not a lidar stream", message.stream_id))
                    })?;
                Ok((idx, Scan::decode(&message.data)?))
            })
    }
}
