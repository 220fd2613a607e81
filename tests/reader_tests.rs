// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Reader tests.
//!
//! Tests cover:
//! - Iteration order for both layouts
//! - Time and stream filtering, and chunk skipping outside a time window
//! - Message index lookups
//! - Corruption detection and recovery of unsealed files

mod common;

use std::fs::{self, OpenOptions};

use common::{imu_payload, lidar_payload, temp_path, write_sample};
use robostream::metadata::{LidarSensor, StreamDescriptor};
use robostream::{
    ChunksLayout, Message, MessageFilter, Reader, ReaderBuilder, TypeRegistry, WriterBuilder,
};

const LAYOUTS: [ChunksLayout; 2] = [ChunksLayout::Standard, ChunksLayout::Streaming];

// ============================================================================
// Iteration
// ============================================================================

#[test]
fn test_messages_in_save_order() {
    for layout in LAYOUTS {
        let (path, _guard) = temp_path("reader", "order.rsf");
        let sample = write_sample(&path, layout, 128, 25);

        let reader = Reader::open(&path).unwrap();
        let messages: Vec<_> = reader.messages().map(|m| m.unwrap()).collect();
        assert_eq!(messages.len(), 75, "{layout}");

        let mut expected = Vec::new();
        for i in 0..25u64 {
            expected.push((sample.lidar_stream, 1_000 + i * 100, lidar_payload(i)));
            expected.push((sample.imu_stream, 1_000 + i * 100, imu_payload(2 * i)));
            expected.push((sample.imu_stream, 1_050 + i * 100, imu_payload(2 * i + 1)));
        }
        let got: Vec<_> = messages
            .into_iter()
            .map(|m| (m.stream_id, m.ts, m.data))
            .collect();
        assert_eq!(got, expected, "{layout}");
    }
}

#[test]
fn test_streaming_merge_is_time_ordered() {
    let (path, _guard) = temp_path("reader", "merge.rsf");
    write_sample(&path, ChunksLayout::Streaming, 64, 40);

    let reader = Reader::open(&path).unwrap();
    assert!(reader.chunk_count() > 2);
    let stamps: Vec<u64> = reader.messages().map(|m| m.unwrap().ts).collect();
    assert_eq!(stamps.len(), 120);
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_time_range_is_inclusive() {
    for layout in LAYOUTS {
        let (path, _guard) = temp_path("reader", "range.rsf");
        write_sample(&path, layout, 64, 10);

        let reader = Reader::open(&path).unwrap();
        let stamps: Vec<u64> = reader
            .messages_in_range(1_100, 1_250)
            .map(|m| m.unwrap().ts)
            .collect();
        assert_eq!(stamps, vec![1_100, 1_100, 1_150, 1_200, 1_200, 1_250], "{layout}");

        assert_eq!(reader.messages_in_range(5_000, 6_000).count(), 0);
        assert_eq!(reader.messages_in_range(0, 999).count(), 0);
    }
}

#[test]
fn test_range_matches_filtered_full_scan() {
    let ranges = [
        (0, u64::MAX),
        (1_000, 1_000),
        (1_050, 1_349),
        (1_149, 1_151),
        (1_975, 5_000),
        (2_950, 2_950),
        (0, 999),
        (2_000, 1_000),
    ];
    for layout in LAYOUTS {
        let (path, _guard) = temp_path("reader", "equiv.rsf");
        write_sample(&path, layout, 64, 20);
        let reader = Reader::open(&path).unwrap();
        let all: Vec<Message> = reader.messages().map(|m| m.unwrap()).collect();

        for (start, end) in ranges {
            let expected: Vec<&Message> = all
                .iter()
                .filter(|m| start <= m.ts && m.ts <= end)
                .collect();
            let got: Vec<Message> = reader
                .messages_in_range(start, end)
                .map(|m| m.unwrap())
                .collect();
            assert_eq!(
                got.iter().collect::<Vec<_>>(),
                expected,
                "{layout} [{start}, {end}]"
            );
        }
    }
}

#[test]
fn test_range_skips_chunks_outside_window() {
    let (start, end) = (1_000, 1_400);
    for layout in LAYOUTS {
        let (path, _guard) = temp_path("reader", "skip.rsf");
        write_sample(&path, layout, 64, 20);
        let (expected, outside): (Vec<Message>, Vec<u64>) = {
            let reader = Reader::open(&path).unwrap();
            let expected = reader
                .messages_in_range(start, end)
                .map(|m| m.unwrap())
                .collect();
            let outside = reader
                .chunks()
                .filter(|c| !c.intersects(start, end))
                .map(|c| c.offset)
                .collect();
            (expected, outside)
        };
        assert!(!outside.is_empty(), "{layout}");

        // Break the framing of every chunk outside the window.
        let mut bytes = fs::read(&path).unwrap();
        for offset in &outside {
            bytes[*offset as usize] = 0x00;
        }
        fs::write(&path, &bytes).unwrap();

        let reader = Reader::open(&path).unwrap();
        let got: Vec<Message> = reader
            .messages_in_range(start, end)
            .map(|m| m.unwrap())
            .collect();
        assert_eq!(got, expected, "{layout}");
        assert!(!got.is_empty());
        assert!(reader.messages().any(|m| m.is_err()), "{layout}");
    }
}

#[test]
fn test_stream_filters() {
    for layout in LAYOUTS {
        let (path, _guard) = temp_path("reader", "streams.rsf");
        let sample = write_sample(&path, layout, 64, 10);
        let reader = Reader::open(&path).unwrap();

        let imu: Vec<_> = reader
            .messages_for_streams(&[sample.imu_stream])
            .map(|m| m.unwrap())
            .collect();
        assert_eq!(imu.len(), 20);
        assert!(imu.iter().all(|m| m.stream_id == sample.imu_stream));
        assert_eq!(imu[3].data, imu_payload(3));

        assert_eq!(reader.messages_for_streams(&[]).count(), 0);
        assert_eq!(reader.messages_for_streams(&[999]).count(), 0);

        let both = reader
            .messages_for_streams_in_range(
                &[sample.lidar_stream, sample.imu_stream],
                1_000,
                1_050,
            )
            .count();
        assert_eq!(both, 3);

        let filter = MessageFilter::all()
            .with_streams(&[sample.lidar_stream])
            .with_range(1_200, u64::MAX);
        let lidar: Vec<u64> = reader
            .messages_filtered(filter)
            .map(|m| m.unwrap().ts)
            .collect();
        assert_eq!(lidar.len(), 8);
        assert_eq!(lidar[0], 1_200);
    }
}

#[test]
fn test_chunks_in_range() {
    let (path, _guard) = temp_path("reader", "chunks.rsf");
    write_sample(&path, ChunksLayout::Standard, 64, 30);
    let reader = Reader::open(&path).unwrap();

    let all = reader.chunk_count();
    let some = reader.chunks_in_range(1_000, 1_100).count();
    assert!(some >= 1 && some < all);
    for chunk in reader.chunks_in_range(2_000, 2_000) {
        assert!(chunk.start_ts <= 2_000 && chunk.end_ts >= 2_000);
    }
}

// ============================================================================
// Stream info and lookups
// ============================================================================

#[test]
fn test_stream_info_and_bounds() {
    let (path, _guard) = temp_path("reader", "info.rsf");
    let sample = write_sample(&path, ChunksLayout::Streaming, 0, 12);
    let reader = Reader::open(&path).unwrap();

    assert_eq!(reader.streams().len(), 2);
    assert_eq!(reader.stream(sample.lidar_stream).unwrap().name, "/lidar");
    assert_eq!(
        reader.stream(sample.imu_stream).unwrap().source_meta_id,
        sample.sensor_id
    );
    assert_eq!(reader.start_ts(), Some(1_000));
    assert_eq!(reader.end_ts(), Some(2_150));
    assert_eq!(reader.message_count(), 36);

    let imu = reader.stream_stats(sample.imu_stream).unwrap();
    assert_eq!(imu.message_count, 24);
    assert_eq!(imu.start_ts, 1_000);
    assert_eq!(imu.end_ts, 2_150);
    // "imu-0".."imu-23"
    assert!((5..=6).contains(&imu.message_avg_size));
    assert!(reader.streaming_info().is_some());
}

#[test]
fn test_message_index_lookups() {
    for message_index in [true, false] {
        let (path, _guard) = temp_path("reader", "lookup.rsf");
        let mut writer = WriterBuilder::new()
            .path(&path)
            .chunk_size(64)
            .message_index(message_index)
            .build()
            .unwrap();
        let sample = common::populate(&mut writer, 10);
        writer.close().unwrap();

        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.has_message_idx(), message_index);
        let imu = sample.imu_stream;

        assert_eq!(reader.ts_by_message_idx(imu, 0).unwrap(), Some(1_000));
        assert_eq!(reader.ts_by_message_idx(imu, 3).unwrap(), Some(1_150));
        assert_eq!(reader.ts_by_message_idx(imu, 20).unwrap(), None);
        assert_eq!(reader.ts_by_message_idx(999, 0).unwrap(), None);

        assert_eq!(reader.message_idx_by_ts(imu, 1_150).unwrap(), Some(3));
        assert_eq!(reader.message_idx_by_ts(imu, 1_151).unwrap(), Some(4));
        assert_eq!(reader.message_idx_by_ts(imu, 0).unwrap(), Some(0));
        assert_eq!(reader.message_idx_by_ts(imu, 9_999).unwrap(), None);
    }
}

#[test]
fn test_custom_registry_leaves_unknown_entries_opaque() {
    let (path, _guard) = temp_path("reader", "registry.rsf");
    let sample = write_sample(&path, ChunksLayout::Streaming, 0, 2);

    let reader = ReaderBuilder::new()
        .path(&path)
        .registry(TypeRegistry::new())
        .build()
        .unwrap();
    let entry = reader.metadata_store().get(sample.sensor_id).unwrap();
    assert!(reader.registry().decode(entry).is_unknown());
    // Typed access does not depend on the registry.
    assert!(entry.as_kind::<LidarSensor>().is_some());
    assert!(reader
        .metadata_store()
        .get(sample.lidar_stream)
        .unwrap()
        .is::<StreamDescriptor>());
    assert_eq!(reader.messages().count(), 6);
}

// ============================================================================
// Corruption and recovery
// ============================================================================

#[test]
fn test_corrupted_footer_is_detected() {
    for layout in LAYOUTS {
        let (path, _guard) = temp_path("reader", "crc.rsf");
        write_sample(&path, layout, 0, 5);
        let data_end = Reader::open(&path).unwrap().data_end() as usize;
        let original = fs::read(&path).unwrap();

        for at in data_end..original.len() {
            let mut bytes = original.clone();
            bytes[at] ^= 0xff;
            fs::write(&path, &bytes).unwrap();
            assert!(
                Reader::open(&path).is_err(),
                "{layout}: flipped footer byte {} of {} went unnoticed",
                at - data_end,
                original.len() - data_end
            );
        }

        let mut bytes = original.clone();
        bytes[data_end + 12] ^= 0xff;
        fs::write(&path, &bytes).unwrap();
        let err = Reader::open(&path).unwrap_err();
        assert!(err.is_corruption(), "{err}");
    }
}

#[test]
fn test_bad_magic_is_detected() {
    let (path, _guard) = temp_path("reader", "magic.rsf");
    write_sample(&path, ChunksLayout::Standard, 0, 1);
    let mut bytes = fs::read(&path).unwrap();
    bytes[1] = b'X';
    fs::write(&path, &bytes).unwrap();

    assert!(Reader::open(&path).unwrap_err().is_corruption());

    fs::write(&path, b"short").unwrap();
    assert!(Reader::open(&path).unwrap_err().is_corruption());
}

#[test]
fn test_missing_file_is_io_error() {
    let (path, _guard) = temp_path("reader", "missing.rsf");
    let err = Reader::open(&path).unwrap_err();
    assert!(!err.is_corruption());
    assert!(!err.is_usage());
}

#[test]
fn test_recover_unsealed_streaming_file() {
    let (path, _guard) = temp_path("reader", "recover.rsf");
    let sample = write_sample(&path, ChunksLayout::Streaming, 64, 20);
    let sealed = Reader::open(&path).unwrap();
    let data_end = sealed.data_end();
    let total = sealed.message_count();
    drop(sealed);

    // Cut the footer away, as if the writer never closed.
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(data_end)
        .unwrap();

    assert!(Reader::open(&path).unwrap_err().is_corruption());

    let reader = Reader::recover(&path).unwrap();
    assert!(reader.is_recovered());
    assert_eq!(reader.message_count(), total);
    assert_eq!(reader.streams().len(), 2);
    assert!(reader.stream(sample.lidar_stream).is_some());
    assert_eq!(
        reader
            .messages_for_streams(&[sample.lidar_stream])
            .count(),
        20
    );
}

#[test]
fn test_recover_truncated_chunk() {
    let (path, _guard) = temp_path("reader", "truncated.rsf");
    write_sample(&path, ChunksLayout::Streaming, 64, 20);
    let data_end = Reader::open(&path).unwrap().data_end();

    // Cut into the middle of the last chunk's records.
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(data_end - 10)
        .unwrap();

    let reader = Reader::recover(&path).unwrap();
    let count = reader.messages().count() as u64;
    assert!(count > 0 && count < 60);
    assert_eq!(count, reader.message_count());
    assert!(reader.messages().all(|m| m.is_ok()));
}

#[test]
fn test_standard_layout_cannot_be_recovered() {
    let (path, _guard) = temp_path("reader", "standard.rsf");
    write_sample(&path, ChunksLayout::Standard, 64, 10);
    let data_end = Reader::open(&path).unwrap().data_end();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(data_end)
        .unwrap();

    assert!(Reader::recover(&path).unwrap_err().is_corruption());
}
