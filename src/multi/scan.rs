// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Lidar scan payloads.
//!
//! A scan is a `columns x rows` frame with any number of named per-pixel
//! fields. Encoded layout:
//!
//! ```text
//! timestamp:u64 | columns:u32 | rows:u32 | n:u16 |
//! (name:str | element_size:u8 | data:bytes) * n
//! ```

use std::collections::HashSet;

use crate::core::bytes::{ByteBuffer, ByteCursor};
use crate::core::{Result, StreamError};
use crate::metadata::FieldSpec;

/// Check that a field set can be stored: every width is non-zero and
/// every name unique.
pub fn validate_fields(operation: &str, fields: &[FieldSpec]) -> Result<()> {
    let mut names = HashSet::with_capacity(fields.len());
    for spec in fields {
        if spec.element_size == 0 {
            return Err(StreamError::usage(
                operation,
                format!("field {} has zero element size", spec.name),
            ));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(StreamError::usage(
                operation,
                format!("field {} listed twice", spec.name),
            ));
        }
    }
    Ok(())
}

/// One per-pixel field of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanField {
    pub spec: FieldSpec,
    /// `columns * rows` little-endian elements of `spec.element_size` bytes
    pub data: Vec<u8>,
}

/// A lidar frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Frame timestamp in nanoseconds
    pub timestamp: u64,
    pub columns: u32,
    pub rows: u32,
    pub fields: Vec<ScanField>,
}

impl Scan {
    /// Empty scan without fields.
    pub fn new(timestamp: u64, columns: u32, rows: u32) -> Self {
        Self {
            timestamp,
            columns,
            rows,
            fields: Vec::new(),
        }
    }

    /// Pixels per field.
    pub fn pixel_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Add a field; `data` must hold exactly one element per pixel.
    pub fn add_field(&mut self, spec: FieldSpec, data: Vec<u8>) -> Result<()> {
        if spec.element_size == 0 {
            return Err(StreamError::usage(
                "add_field",
                format!("field {} has zero element size", spec.name),
            ));
        }
        if self.field(&spec.name).is_some() {
            return Err(StreamError::usage(
                "add_field",
                format!("field {} already present", spec.name),
            ));
        }
        let expected = self.pixel_count() * spec.element_size as usize;
        if data.len() != expected {
            return Err(StreamError::usage(
                "add_field",
                format!(
                    "field {} holds {} bytes, expected {expected}",
                    spec.name,
                    data.len()
                ),
            ));
        }
        self.fields.push(ScanField { spec, data });
        Ok(())
    }

    /// Builder form of [`add_field`](Self::add_field).
    pub fn with_field(mut self, spec: FieldSpec, data: Vec<u8>) -> Result<Self> {
        self.add_field(spec, data)?;
        Ok(self)
    }

    pub fn field(&self, name: &str) -> Option<&ScanField> {
        self.fields.iter().find(|f| f.spec.name == name)
    }

    /// Field set in storage order.
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        self.fields.iter().map(|f| f.spec.clone()).collect()
    }

    /// Whether the scan already has exactly the `fields` layout.
    pub fn matches_fields(&self, fields: &[FieldSpec]) -> bool {
        self.fields.len() == fields.len()
            && self.fields.iter().zip(fields).all(|(f, spec)| &f.spec == spec)
    }

    /// Reduce or widen the scan to `fields`.
    ///
    /// Fields outside the set are dropped, missing ones are zero-filled and
    /// width mismatches are converted element-wise by little-endian
    /// truncation or zero extension. Zero-width fields on either side carry
    /// no data.
    pub fn cast_to(&self, fields: &[FieldSpec]) -> Scan {
        let pixels = self.pixel_count();
        let fields = fields
            .iter()
            .map(|spec| {
                let width = spec.element_size as usize;
                let data = match self.field(&spec.name) {
                    Some(field) if field.spec.element_size == spec.element_size => {
                        field.data.clone()
                    }
                    Some(field) if width > 0 && field.spec.element_size > 0 => {
                        let src_width = field.spec.element_size as usize;
                        let keep = src_width.min(width);
                        let mut data = vec![0u8; pixels * width];
                        for (dst, src) in data
                            .chunks_exact_mut(width)
                            .zip(field.data.chunks_exact(src_width))
                        {
                            dst[..keep].copy_from_slice(&src[..keep]);
                        }
                        data
                    }
                    _ => vec![0u8; pixels * width],
                };
                ScanField {
                    spec: spec.clone(),
                    data,
                }
            })
            .collect();
        Scan {
            timestamp: self.timestamp,
            columns: self.columns,
            rows: self.rows,
            fields,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let size: usize = self
            .fields
            .iter()
            .map(|f| 9 + f.spec.name.len() + f.data.len())
            .sum();
        let mut buf = ByteBuffer::with_capacity(18 + size);
        buf.put_u64(self.timestamp);
        buf.put_u32(self.columns);
        buf.put_u32(self.rows);
        buf.put_u16(self.fields.len() as u16);
        for field in &self.fields {
            buf.put_str(&field.spec.name);
            buf.put_u8(field.spec.element_size);
            buf.put_bytes(&field.data);
        }
        buf.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        let timestamp = cursor.read_u64()?;
        let columns = cursor.read_u32()?;
        let rows = cursor.read_u32()?;
        let count = cursor.read_u16()?;

        let mut scan = Scan::new(timestamp, columns, rows);
        for _ in 0..count {
            let name = cursor.read_string()?;
            let element_size = cursor.read_u8()?;
            let data = cursor.read_bytes()?.to_vec();
            scan.add_field(FieldSpec::new(name, element_size), data)
                .map_err(|e| StreamError::decode("scan", e.to_string()))?;
        }
        if !cursor.is_empty() {
            return Err(StreamError::decode(
                "scan",
                format!("{} trailing bytes", cursor.remaining()),
            ));
        }
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan() -> Scan {
        Scan::new(7, 2, 2)
            .with_field(FieldSpec::new("RANGE", 4), vec![1, 0, 0, 0, 2, 1, 0, 0, 3, 0, 0, 0, 4, 0, 0, 1])
            .unwrap()
            .with_field(FieldSpec::new("SIGNAL", 2), vec![9, 0, 8, 0, 7, 0, 6, 0])
            .unwrap()
    }

    #[test]
    fn test_scan_encoding() {
        let scan = scan();
        assert_eq!(Scan::decode(&scan.encode()).unwrap(), scan);
        assert!(Scan::decode(&scan.encode()[..20]).is_err());
    }

    #[test]
    fn test_add_field_validates_length() {
        let mut scan = Scan::new(0, 4, 2);
        let err = scan.add_field(FieldSpec::new("RANGE", 4), vec![0; 31]).unwrap_err();
        assert!(err.is_usage());
        assert!(scan.add_field(FieldSpec::new("RANGE", 0), vec![]).is_err());
        scan.add_field(FieldSpec::new("RANGE", 4), vec![0; 32]).unwrap();
        assert!(scan.add_field(FieldSpec::new("RANGE", 4), vec![0; 32]).is_err());
    }

    #[test]
    fn test_cast_drops_fills_and_converts() {
        let locked = vec![FieldSpec::new("RANGE", 2), FieldSpec::new("REFLECTIVITY", 1)];
        let cast = scan().cast_to(&locked);

        assert!(cast.matches_fields(&locked));
        assert!(cast.field("SIGNAL").is_none());
        // 4-byte ranges truncated to their low 2 bytes.
        assert_eq!(cast.field("RANGE").unwrap().data, vec![1, 0, 2, 1, 3, 0, 4, 0]);
        assert_eq!(cast.field("REFLECTIVITY").unwrap().data, vec![0; 4]);
    }

    #[test]
    fn test_validate_fields() {
        let good = [FieldSpec::new("RANGE", 4), FieldSpec::new("SIGNAL", 2)];
        assert!(validate_fields("create", &good).is_ok());
        assert!(validate_fields("create", &[]).is_ok());

        let zero = [FieldSpec::new("RANGE", 0)];
        assert!(validate_fields("create", &zero).unwrap_err().is_usage());
        let twice = [FieldSpec::new("RANGE", 4), FieldSpec::new("RANGE", 2)];
        assert!(validate_fields("create", &twice).unwrap_err().is_usage());
    }

    #[test]
    fn test_cast_with_zero_width_does_not_panic() {
        let cast = scan().cast_to(&[FieldSpec::new("RANGE", 0)]);
        assert!(cast.field("RANGE").unwrap().data.is_empty());

        let mut odd = scan();
        odd.fields[1].spec.element_size = 0;
        let cast = odd.cast_to(&[FieldSpec::new("SIGNAL", 2)]);
        assert_eq!(cast.field("SIGNAL").unwrap().data, vec![0; 8]);
    }

    #[test]
    fn test_cast_widens() {
        let cast = scan().cast_to(&[FieldSpec::new("SIGNAL", 4)]);
        assert_eq!(
            cast.field("SIGNAL").unwrap().data,
            vec![9, 0, 0, 0, 8, 0, 0, 0, 7, 0, 0, 0, 6, 0, 0, 0]
        );
    }
}
