// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Built-in metadata kinds.

pub mod sensor;
pub mod stream;
pub mod streaming_info;

pub use sensor::{Extrinsics, LidarSensor, SensorInfo, IDENTITY};
pub use stream::{FieldSpec, StreamDescriptor, SCHEMA_IMU, SCHEMA_LIDAR_SCAN, SCHEMA_RAW};
pub use streaming_info::{ChunkStreams, StreamStats, StreamingInfo};
