// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use robostream::metadata::{LidarSensor, SensorInfo, StreamDescriptor, SCHEMA_IMU, SCHEMA_RAW};
use robostream::{ChunksLayout, Writer, WriterBuilder};

// ============================================================================
// Temporary files
// ============================================================================

/// Get a unique temporary directory for one test.
pub fn temp_dir(prefix: &str) -> PathBuf {
    let random = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let thread_id = format!("{:?}", std::thread::current().id())
        .replace(|c: char| !c.is_ascii_alphanumeric(), "");
    std::env::temp_dir().join(format!(
        "robostream_{}_{}_{}_{}",
        prefix,
        std::process::id(),
        thread_id,
        random
    ))
}

/// Create a temporary file path with cleanup guard.
pub fn temp_path(prefix: &str, name: &str) -> (PathBuf, CleanupGuard) {
    let dir = temp_dir(prefix);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    (path, CleanupGuard(dir))
}

/// Removes a test directory on drop.
#[derive(Debug)]
pub struct CleanupGuard(pub PathBuf);

impl CleanupGuard {
    /// Another file inside the guarded directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

// ============================================================================
// Sample files
// ============================================================================

/// Ids of the sample file's metadata.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub sensor_id: u32,
    pub lidar_stream: u32,
    pub imu_stream: u32,
}

pub fn sensor(serial: u64) -> SensorInfo {
    SensorInfo {
        serial_number: serial,
        product_line: "OS-1-64".to_string(),
        firmware_rev: "v2.4.0".to_string(),
        lidar_mode: "1024x10".to_string(),
        columns_per_frame: 1024,
        pixels_per_column: 64,
        metadata: r#"{"beam_altitude_angles":[]}"#.to_string(),
        ..SensorInfo::default()
    }
}

/// Payload of message `i` on the sample's lidar stream.
pub fn lidar_payload(i: u64) -> Vec<u8> {
    format!("lidar-{i}").into_bytes()
}

/// Payload of message `i` on the sample's imu stream.
pub fn imu_payload(i: u64) -> Vec<u8> {
    format!("imu-{i}").into_bytes()
}

/// Write a file with one sensor, a lidar stream of `lidar` messages every
/// 100 ns and an imu stream of 2 * `lidar` messages every 50 ns.
pub fn write_sample(path: &Path, layout: ChunksLayout, chunk_size: usize, lidar: u64) -> Sample {
    let mut writer = WriterBuilder::new()
        .path(path)
        .layout(layout)
        .chunk_size(chunk_size)
        .build()
        .unwrap();
    let sample = populate(&mut writer, lidar);
    writer.close().unwrap();
    sample
}

/// Declare the sample metadata and streams on `writer` and save messages.
pub fn populate(writer: &mut Writer, lidar: u64) -> Sample {
    let sensor_id = writer.add_metadata(LidarSensor::new(sensor(7))).unwrap();
    let lidar_stream = writer
        .add_stream(StreamDescriptor::new("/lidar", SCHEMA_RAW, sensor_id))
        .unwrap();
    let imu_stream = writer
        .add_stream(StreamDescriptor::new("/imu", SCHEMA_IMU, sensor_id))
        .unwrap();

    for i in 0..lidar {
        writer
            .save(lidar_stream, 1_000 + i * 100, &lidar_payload(i))
            .unwrap();
        writer
            .save(imu_stream, 1_000 + i * 100, &imu_payload(2 * i))
            .unwrap();
        writer
            .save(imu_stream, 1_050 + i * 100, &imu_payload(2 * i + 1))
            .unwrap();
    }

    Sample {
        sensor_id,
        lidar_stream,
        imu_stream,
    }
}
