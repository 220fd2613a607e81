// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record framing: `opcode:u8 | body_len:u64 | body`.

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{Result, StreamError};
use crate::io::constants::RECORD_HEADER_LEN;

/// A framed record borrowed from a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub opcode: u8,
    /// Offset of the record (opcode byte) in the slice
    pub offset: usize,
    pub body: &'a [u8],
}

impl Record<'_> {
    /// Offset just past the record.
    pub fn end(&self) -> usize {
        self.offset + RECORD_HEADER_LEN + self.body.len()
    }
}

/// Frame `body` as a record.
pub fn encode_record(opcode: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_HEADER_LEN + body.len());
    out.push(opcode);
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Read the record starting at `offset`.
///
/// Returns `Ok(None)` when the data ends before the record does, which is
/// how an interrupted write looks.
pub fn read_record(data: &[u8], offset: usize) -> Option<Record<'_>> {
    let header_end = offset.checked_add(RECORD_HEADER_LEN)?;
    if header_end > data.len() {
        return None;
    }
    let opcode = data[offset];
    let len = LittleEndian::read_u64(&data[offset + 1..header_end]);
    let end = header_end.checked_add(usize::try_from(len).ok()?)?;
    if end > data.len() {
        return None;
    }
    Some(Record {
        opcode,
        offset,
        body: &data[header_end..end],
    })
}

/// Read the record at `offset`, requiring a specific opcode.
pub fn expect_record<'a>(
    data: &'a [u8],
    offset: usize,
    opcode: u8,
    what: &str,
) -> Result<Record<'a>> {
    let record = read_record(data, offset).ok_or_else(|| {
        StreamError::decode(what, format!("truncated record at offset {offset}"))
    })?;
    if record.opcode != opcode {
        return Err(StreamError::decode(
            what,
            format!(
                "expected opcode 0x{opcode:02x} at offset {offset}, found 0x{:02x}",
                record.opcode
            ),
        ));
    }
    Ok(record)
}
