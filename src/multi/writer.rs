// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Multi-sensor scan writer.
//!
//! Each sensor gets one lidar scan stream, addressed by its position in the
//! sensor list. The field set of a stream is fixed either up front or by the
//! first scan saved to it; later scans are cast to that set.

use std::fmt;
use std::path::Path;

use crate::core::{Result, StreamError};
use crate::io::writer::{Writer, WriterConfig};
use crate::metadata::{FieldSpec, LidarSensor, SensorInfo, StreamDescriptor};

use super::scan::{validate_fields, Scan};

#[derive(Debug, Clone)]
struct LockedStream {
    stream_id: u32,
    fields: Vec<FieldSpec>,
}

/// Writes lidar scans of several sensors into one file.
pub struct MultiWriter {
    writer: Writer,
    sensors: Vec<SensorInfo>,
    /// Metadata id of each sensor's descriptor
    sensor_ids: Vec<u32>,
    streams: Vec<Option<LockedStream>>,
}

impl MultiWriter {
    /// Create a writer for `sensors`.
    ///
    /// With `fields` set every stream is created immediately with that
    /// field set; otherwise each stream locks the fields of its first scan.
    /// A field set with a zero width or a repeated name is rejected before
    /// the file is created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        sensors: Vec<SensorInfo>,
        config: WriterConfig,
        fields: Option<Vec<FieldSpec>>,
    ) -> Result<Self> {
        if sensors.is_empty() {
            return Err(StreamError::usage(
                "MultiWriter::create",
                "at least one sensor is required",
            ));
        }
        if let Some(fields) = &fields {
            validate_fields("MultiWriter::create", fields)?;
        }
        let mut writer = Writer::with_config(path, config)?;
        let mut sensor_ids = Vec::with_capacity(sensors.len());
        for info in &sensors {
            sensor_ids.push(writer.add_metadata(LidarSensor::new(info.clone()))?);
        }

        let mut multi = Self {
            writer,
            streams: vec![None; sensors.len()],
            sensors,
            sensor_ids,
        };
        if let Some(fields) = fields {
            for idx in 0..multi.sensors.len() {
                multi.lock_stream(idx, fields.clone())?;
            }
        }
        Ok(multi)
    }

    /// Create a writer for a single sensor.
    pub fn single<P: AsRef<Path>>(
        path: P,
        sensor: SensorInfo,
        config: WriterConfig,
        fields: Option<Vec<FieldSpec>>,
    ) -> Result<Self> {
        Self::create(path, vec![sensor], config, fields)
    }

    /// Save a scan to the stream of sensor `stream_index`.
    pub fn save(&mut self, stream_index: usize, scan: &Scan) -> Result<()> {
        if self.writer.is_closed() {
            return Err(StreamError::usage("save", "writer is closed"));
        }
        if stream_index >= self.sensors.len() {
            return Err(StreamError::usage(
                "save",
                format!(
                    "stream index {stream_index} out of range, writer has {} streams",
                    self.sensors.len()
                ),
            ));
        }

        let locked = match &self.streams[stream_index] {
            Some(locked) => locked.clone(),
            None => self.lock_stream(stream_index, scan.field_specs())?,
        };
        let payload = if scan.matches_fields(&locked.fields) {
            scan.encode()
        } else {
            tracing::warn!(
                stream_index,
                stream_id = locked.stream_id,
                "scan fields differ from the stream's field set, casting"
            );
            scan.cast_to(&locked.fields).encode()
        };
        self.writer.save(locked.stream_id, scan.timestamp, &payload)
    }

    /// Save one scan per sensor, in sensor order.
    pub fn save_all(&mut self, scans: &[Scan]) -> Result<()> {
        if scans.len() != self.sensors.len() {
            return Err(StreamError::usage(
                "save_all",
                format!(
                    "got {} scans for {} streams",
                    scans.len(),
                    self.sensors.len()
                ),
            ));
        }
        for (idx, scan) in scans.iter().enumerate() {
            self.save(idx, scan)?;
        }
        Ok(())
    }

    pub fn sensor_info(&self, stream_index: usize) -> Option<&SensorInfo> {
        self.sensors.get(stream_index)
    }

    pub fn sensor_infos(&self) -> &[SensorInfo] {
        &self.sensors
    }

    pub fn sensor_info_count(&self) -> usize {
        self.sensors.len()
    }

    /// Stream id backing `stream_index`, None until its field set is fixed.
    pub fn stream_id(&self, stream_index: usize) -> Option<u32> {
        self.streams
            .get(stream_index)
            .and_then(|s| s.as_ref())
            .map(|s| s.stream_id)
    }

    /// Locked field set of `stream_index`.
    pub fn fields(&self, stream_index: usize) -> Option<&[FieldSpec]> {
        self.streams
            .get(stream_index)
            .and_then(|s| s.as_ref())
            .map(|s| s.fields.as_slice())
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    pub fn chunk_size(&self) -> usize {
        self.writer.chunk_size()
    }

    /// Underlying writer, e.g. for adding extra metadata.
    pub fn writer_mut(&mut self) -> &mut Writer {
        &mut self.writer
    }

    /// Seal the file. Streams that never received a scan are declared with
    /// an empty field set so every sensor has a stream.
    pub fn close(&mut self) -> Result<()> {
        if self.writer.is_closed() {
            return Ok(());
        }
        for idx in 0..self.streams.len() {
            if self.streams[idx].is_none() {
                self.lock_stream(idx, Vec::new())?;
            }
        }
        self.writer.close()
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    fn lock_stream(&mut self, idx: usize, fields: Vec<FieldSpec>) -> Result<LockedStream> {
        validate_fields("save", &fields)?;
        let descriptor = StreamDescriptor::lidar_scan(self.sensor_ids[idx], fields.clone());
        let stream_id = self.writer.add_stream(descriptor)?;
        tracing::debug!(stream_index = idx, stream_id, fields = fields.len(), "locked stream fields");
        let locked = LockedStream { stream_id, fields };
        self.streams[idx] = Some(locked.clone());
        Ok(locked)
    }
}

impl fmt::Debug for MultiWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiWriter")
            .field("writer", &self.writer)
            .field("sensors", &self.sensors.len())
            .finish()
    }
}

impl Drop for MultiWriter {
    fn drop(&mut self) {
        if self.writer.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.writer.path().display(), error = %e, "failed to seal on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::layout::ChunksLayout;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "robostream_multi_{}_{}_{}.rsf",
            name,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ))
    }

    fn sensor(serial: u64) -> SensorInfo {
        SensorInfo {
            serial_number: serial,
            columns_per_frame: 2,
            pixels_per_column: 1,
            ..SensorInfo::default()
        }
    }

    fn scan(ts: u64, fields: &[(&str, u8)]) -> Scan {
        let mut scan = Scan::new(ts, 2, 1);
        for (name, size) in fields {
            scan.add_field(FieldSpec::new(*name, *size), vec![1; 2 * *size as usize])
                .unwrap();
        }
        scan
    }

    #[test]
    fn test_first_scan_locks_fields() {
        let path = temp_path("lock");
        let mut writer =
            MultiWriter::create(&path, vec![sensor(1)], WriterConfig::default(), None).unwrap();
        assert_eq!(writer.stream_id(0), None);

        writer.save(0, &scan(1, &[("RANGE", 4)])).unwrap();
        let locked = vec![FieldSpec::new("RANGE", 4)];
        assert_eq!(writer.fields(0), Some(locked.as_slice()));

        writer.save(0, &scan(2, &[("RANGE", 2), ("SIGNAL", 2)])).unwrap();
        assert_eq!(writer.fields(0), Some(locked.as_slice()));
        writer.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_out_of_range_index() {
        let path = temp_path("range");
        let config = WriterConfig {
            layout: ChunksLayout::Standard,
            ..WriterConfig::default()
        };
        let mut writer =
            MultiWriter::create(&path, vec![sensor(1), sensor(2)], config, None).unwrap();
        let err = writer.save(5, &scan(1, &[("RANGE", 4)])).unwrap_err();
        assert!(err.is_usage());
        assert_eq!(writer.stream_id(0), None);
        assert_eq!(writer.stream_id(1), None);

        assert!(writer.save_all(&[scan(1, &[])]).unwrap_err().is_usage());
        writer.close().unwrap();
        assert!(writer.stream_id(0).is_some() && writer.stream_id(1).is_some());
        assert!(writer.save(0, &scan(2, &[])).unwrap_err().is_usage());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_unstorable_field_sets() {
        let cases = [
            vec![FieldSpec::new("RANGE", 0)],
            vec![FieldSpec::new("RANGE", 4), FieldSpec::new("RANGE", 4)],
        ];
        for fields in cases {
            let path = temp_path("bad_fields");
            let err = MultiWriter::create(
                &path,
                vec![sensor(1)],
                WriterConfig::default(),
                Some(fields),
            )
            .unwrap_err();
            assert!(err.is_usage());
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_first_scan_with_duplicate_fields_is_rejected() {
        let path = temp_path("dup_scan");
        let mut writer =
            MultiWriter::create(&path, vec![sensor(1)], WriterConfig::default(), None).unwrap();
        let mut bad = scan(1, &[("RANGE", 4)]);
        bad.fields.push(bad.fields[0].clone());
        assert!(writer.save(0, &bad).unwrap_err().is_usage());
        assert_eq!(writer.stream_id(0), None);

        writer.save(0, &scan(2, &[("RANGE", 4)])).unwrap();
        writer.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_requires_a_sensor() {
        let path = temp_path("empty");
        let err = MultiWriter::create(&path, vec![], WriterConfig::default(), None).unwrap_err();
        assert!(err.is_usage());
        let _ = std::fs::remove_file(&path);
    }
}
