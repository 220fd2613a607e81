// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Writer tests.
//!
//! Tests cover:
//! - Lifecycle (close, double close, use after close)
//! - Metadata and stream declaration rules
//! - Timestamp ordering
//! - Chunking under both layouts
//! - Configuration loading

mod common;

use common::{populate, sensor, temp_path};
use robostream::metadata::{
    LidarSensor, StreamDescriptor, StreamingInfo, SCHEMA_LIDAR_SCAN, SCHEMA_RAW,
};
use robostream::{ChunksLayout, Reader, Writer, WriterBuilder, WriterConfig};

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_close_is_idempotent() {
    let (path, _guard) = temp_path("writer", "close.rsf");
    let mut writer = Writer::create(&path).unwrap();
    populate(&mut writer, 3);

    writer.close().unwrap();
    assert!(writer.is_closed());
    writer.close().unwrap();

    let reader = Reader::open(&path).unwrap();
    assert_eq!(reader.message_count(), 9);
}

#[test]
fn test_operations_after_close_fail() {
    let (path, _guard) = temp_path("writer", "after_close.rsf");
    let mut writer = Writer::create(&path).unwrap();
    let sample = populate(&mut writer, 1);
    writer.close().unwrap();

    assert!(writer
        .save(sample.lidar_stream, 10_000, b"late")
        .unwrap_err()
        .is_usage());
    assert!(writer
        .add_metadata(LidarSensor::new(sensor(9)))
        .unwrap_err()
        .is_usage());
    assert!(writer
        .add_stream(StreamDescriptor::new("/late", SCHEMA_RAW, 0))
        .unwrap_err()
        .is_usage());
}

#[test]
fn test_drop_seals_file() {
    let (path, _guard) = temp_path("writer", "drop.rsf");
    {
        let mut writer = Writer::create(&path).unwrap();
        populate(&mut writer, 2);
    }

    let reader = Reader::open(&path).unwrap();
    assert!(!reader.is_recovered());
    assert_eq!(reader.message_count(), 6);
}

#[test]
fn test_empty_file_is_valid() {
    let (path, _guard) = temp_path("writer", "empty.rsf");
    let mut writer = Writer::create(&path).unwrap();
    writer.close().unwrap();

    let reader = Reader::open(&path).unwrap();
    assert_eq!(reader.message_count(), 0);
    assert_eq!(reader.chunk_count(), 0);
    assert!(reader.streams().is_empty());
    assert_eq!(reader.start_ts(), None);
    assert_eq!(reader.messages().count(), 0);
}

// ============================================================================
// Metadata and streams
// ============================================================================

#[test]
fn test_stream_id_is_descriptor_id() {
    let (path, _guard) = temp_path("writer", "ids.rsf");
    let mut writer = Writer::create(&path).unwrap();
    let sensor_id = writer.add_metadata(LidarSensor::new(sensor(1))).unwrap();
    let stream = writer
        .add_stream(StreamDescriptor::new("/scan", SCHEMA_LIDAR_SCAN, sensor_id))
        .unwrap();
    assert_eq!(sensor_id, 1);
    assert_eq!(stream, 2);
    assert_eq!(writer.stream(stream).unwrap().name, "/scan");
    writer.close().unwrap();

    let reader = Reader::open(&path).unwrap();
    let store = reader.metadata_store();
    assert!(store.get(stream).unwrap().is::<StreamDescriptor>());
    assert_eq!(store.get_kind::<LidarSensor>(sensor_id).unwrap().info, sensor(1));
}

#[test]
fn test_stream_rejections() {
    let (path, _guard) = temp_path("writer", "reject.rsf");
    let mut writer = Writer::create(&path).unwrap();

    let unknown_schema = writer
        .add_stream(StreamDescriptor::new("/x", 999, 0))
        .unwrap_err();
    assert!(unknown_schema.is_usage());

    let missing_source = writer
        .add_stream(StreamDescriptor::new("/x", SCHEMA_RAW, 42))
        .unwrap_err();
    assert!(missing_source.is_usage());

    assert!(writer.save(1, 0, b"nowhere").unwrap_err().is_usage());
    assert!(writer
        .add_metadata(StreamingInfo::new())
        .unwrap_err()
        .is_usage());
    assert!(writer.metadata_store().is_empty());
    writer.close().unwrap();
}

#[test]
fn test_explicit_ids_collide() {
    let (path, _guard) = temp_path("writer", "explicit.rsf");
    let mut writer = Writer::create(&path).unwrap();
    writer
        .add_metadata_with_id(10, LidarSensor::new(sensor(1)))
        .unwrap();
    let err = writer
        .add_metadata_with_id(10, LidarSensor::new(sensor(2)))
        .unwrap_err();
    assert!(err.is_usage());

    // Automatic ids continue after the highest explicit one.
    let next = writer.add_metadata(LidarSensor::new(sensor(3))).unwrap();
    assert_eq!(next, 11);
    writer.close().unwrap();
}

// ============================================================================
// Timestamps
// ============================================================================

#[test]
fn test_timestamp_regression_is_rejected() {
    let (path, _guard) = temp_path("writer", "regress.rsf");
    let mut writer = Writer::create(&path).unwrap();
    let a = writer
        .add_stream(StreamDescriptor::new("/a", SCHEMA_RAW, 0))
        .unwrap();
    let b = writer
        .add_stream(StreamDescriptor::new("/b", SCHEMA_RAW, 0))
        .unwrap();

    writer.save(a, 100, b"a0").unwrap();
    writer.save(a, 100, b"a1").unwrap();
    // Streams are ordered independently.
    writer.save(b, 50, b"b0").unwrap();

    let err = writer.save(a, 99, b"a2").unwrap_err();
    assert!(err.is_usage());
    assert_eq!(writer.message_count(), 3);
    assert_eq!(writer.stream_stats(a).unwrap().message_count, 2);

    writer.close().unwrap();
    let reader = Reader::open(&path).unwrap();
    assert_eq!(reader.message_count(), 3);
}

// ============================================================================
// Chunking
// ============================================================================

#[test]
fn test_small_chunk_size_splits_chunks() {
    for layout in [ChunksLayout::Standard, ChunksLayout::Streaming] {
        let (path, _guard) = temp_path("writer", "chunks.rsf");
        let mut writer = WriterBuilder::new()
            .path(&path)
            .layout(layout)
            .chunk_size(64)
            .build()
            .unwrap();
        populate(&mut writer, 20);
        writer.close().unwrap();
        assert!(writer.chunk_count() > 1, "{layout}: expected several chunks");

        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.layout(), layout);
        assert_eq!(reader.chunk_count(), writer.chunk_count());
        let total: u64 = reader.chunks().map(|c| c.message_count as u64).sum();
        assert_eq!(total, 60);
    }
}

#[test]
fn test_streaming_chunks_hold_one_stream() {
    let (path, _guard) = temp_path("writer", "streaming.rsf");
    let sample = common::write_sample(&path, ChunksLayout::Streaming, 64, 20);

    let reader = Reader::open(&path).unwrap();
    for chunk in reader.chunks() {
        assert_eq!(chunk.stream_ids.len(), 1);
    }
    let lidar = reader.stream_stats(sample.lidar_stream).unwrap();
    assert_eq!(lidar.message_count, 20);
    assert_eq!(lidar.start_ts, 1_000);
    assert_eq!(lidar.end_ts, 2_900);
    assert!(!lidar.chunk_offsets.is_empty());
}

#[test]
fn test_message_index_can_be_disabled() {
    let (path, _guard) = temp_path("writer", "noindex.rsf");
    let mut writer = WriterBuilder::new()
        .path(&path)
        .message_index(false)
        .build()
        .unwrap();
    let sample = populate(&mut writer, 5);
    writer.close().unwrap();

    let reader = Reader::open(&path).unwrap();
    assert!(reader.has_stream_info());
    assert!(!reader.has_message_idx());
    assert_eq!(
        reader.stream_stats(sample.imu_stream).unwrap().message_count,
        10
    );
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_from_toml() {
    let config = WriterConfig::from_toml(
        r#"
chunk_size = 1024
layout = "standard"
message_index = false
file_id = "run-42"
"#,
    )
    .unwrap();
    assert_eq!(config.chunk_size, 1024);
    assert_eq!(config.layout, ChunksLayout::Standard);
    assert!(!config.message_index);

    let (path, _guard) = temp_path("writer", "toml.rsf");
    let mut writer = Writer::with_config(&path, config).unwrap();
    assert_eq!(writer.file_id(), "run-42");
    writer.close().unwrap();
    assert_eq!(Reader::open(&path).unwrap().file_id(), "run-42");

    // Missing keys fall back to defaults.
    let partial = WriterConfig::from_toml("layout = \"streaming\"").unwrap();
    assert_eq!(partial.chunk_size, WriterConfig::default().chunk_size);
    assert!(partial.message_index);

    assert!(WriterConfig::from_toml("layout = \"zigzag\"")
        .unwrap_err()
        .is_usage());
}

#[test]
fn test_random_file_ids_differ() {
    let (path, guard) = temp_path("writer", "a.rsf");
    let other = guard.join("b.rsf");
    let mut a = Writer::create(&path).unwrap();
    let mut b = Writer::create(&other).unwrap();
    assert_ne!(a.file_id(), b.file_id());
    a.close().unwrap();
    b.close().unwrap();
}
