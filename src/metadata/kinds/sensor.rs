// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sensor descriptor and calibration metadata.

use serde::{Deserialize, Serialize};

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::Result;
use crate::metadata::MetadataKind;

/// Row-major 4x4 identity transform.
pub const IDENTITY: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Static description of a lidar sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Serial number
    pub serial_number: u64,
    /// Product line (e.g. "OS-1-128")
    pub product_line: String,
    /// Firmware revision
    pub firmware_rev: String,
    /// Lidar mode (e.g. "1024x10")
    pub lidar_mode: String,
    /// Columns per frame (scan width)
    pub columns_per_frame: u32,
    /// Pixels per column (scan height)
    pub pixels_per_column: u32,
    /// Sensor-to-world transform, row-major
    pub extrinsic: [f64; 16],
    /// Device metadata JSON as reported by the sensor, may be empty
    pub metadata: String,
}

impl Default for SensorInfo {
    fn default() -> Self {
        Self {
            serial_number: 0,
            product_line: String::new(),
            firmware_rev: String::new(),
            lidar_mode: String::new(),
            columns_per_frame: 0,
            pixels_per_column: 0,
            extrinsic: IDENTITY,
            metadata: String::new(),
        }
    }
}

impl SensorInfo {
    pub(crate) fn write_to(&self, buf: &mut ByteBuffer) {
        buf.put_u64(self.serial_number);
        buf.put_str(&self.product_line);
        buf.put_str(&self.firmware_rev);
        buf.put_str(&self.lidar_mode);
        buf.put_u32(self.columns_per_frame);
        buf.put_u32(self.pixels_per_column);
        for v in self.extrinsic {
            buf.put_f64(v);
        }
        buf.put_str(&self.metadata);
    }

    pub(crate) fn read_from(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let serial_number = cursor.read_u64()?;
        let product_line = cursor.read_string()?;
        let firmware_rev = cursor.read_string()?;
        let lidar_mode = cursor.read_string()?;
        let columns_per_frame = cursor.read_u32()?;
        let pixels_per_column = cursor.read_u32()?;
        let mut extrinsic = [0.0; 16];
        for v in extrinsic.iter_mut() {
            *v = cursor.read_f64()?;
        }
        let metadata = cursor.read_string()?;
        Ok(Self {
            serial_number,
            product_line,
            firmware_rev,
            lidar_mode,
            columns_per_frame,
            pixels_per_column,
            extrinsic,
            metadata,
        })
    }
}

/// Lidar sensor descriptor entry; streams reference it as their source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarSensor {
    pub info: SensorInfo,
}

impl LidarSensor {
    pub fn new(info: SensorInfo) -> Self {
        Self { info }
    }
}

impl MetadataKind for LidarSensor {
    const TYPE: &'static str = "robostream/v1/os_sensor/LidarSensor";

    fn encode(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(256);
        self.info.write_to(&mut buf);
        buf.into_vec()
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Self {
            info: SensorInfo::read_from(&mut cursor)?,
        })
    }
}

/// Calibrated transform for another metadata entry (usually a sensor).
///
/// Fixed-size payload apart from `name`, so corrected calibrations can be
/// patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// Row-major 4x4 transform
    pub matrix: [f64; 16],
    /// Id of the entry this transform applies to
    pub ref_meta_id: u32,
    /// Where the calibration came from
    pub name: String,
}

impl Extrinsics {
    pub fn new(matrix: [f64; 16], ref_meta_id: u32, name: impl Into<String>) -> Self {
        Self {
            matrix,
            ref_meta_id,
            name: name.into(),
        }
    }
}

impl MetadataKind for Extrinsics {
    const TYPE: &'static str = "robostream/v1/os_sensor/Extrinsics";

    fn encode(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(16 * 8 + 8 + self.name.len());
        for v in self.matrix {
            buf.put_f64(v);
        }
        buf.put_u32(self.ref_meta_id);
        buf.put_str(&self.name);
        buf.into_vec()
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        let mut matrix = [0.0; 16];
        for v in matrix.iter_mut() {
            *v = cursor.read_f64()?;
        }
        let ref_meta_id = cursor.read_u32()?;
        let name = cursor.read_string()?;
        Ok(Self {
            matrix,
            ref_meta_id,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lidar_sensor_encoding() {
        let sensor = LidarSensor::new(SensorInfo {
            serial_number: 122_201_000_998,
            product_line: "OS-0-64".to_string(),
            firmware_rev: "v2.5.2".to_string(),
            lidar_mode: "1024x10".to_string(),
            columns_per_frame: 1024,
            pixels_per_column: 64,
            extrinsic: IDENTITY,
            metadata: r#"{"beam_altitude_angles":[]}"#.to_string(),
        });
        let decoded = LidarSensor::decode(&sensor.encode()).unwrap();
        assert_eq!(decoded, sensor);
    }

    #[test]
    fn test_truncated_sensor_buffer() {
        let buf = LidarSensor::new(SensorInfo::default()).encode();
        assert!(LidarSensor::decode(&buf[..buf.len() - 1]).is_err());
    }

    #[test]
    fn test_extrinsics_same_name_same_length() {
        let a = Extrinsics::new(IDENTITY, 1, "calib");
        let mut m = IDENTITY;
        m[3] = 1.5;
        let b = Extrinsics::new(m, 1, "calib");
        assert_eq!(a.encode().len(), b.encode().len());
        assert_eq!(Extrinsics::decode(&b.encode()).unwrap(), b);
    }
}
