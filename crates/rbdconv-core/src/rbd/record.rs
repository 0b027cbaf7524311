//! Typed, length-prefixed records.
//!
//! Every metadata field in an export-diff stream is framed as
//! `[tag: u8][length: u64 LE][payload: length bytes]`.

use std::io::{self, Write};

/// Size of the tag byte plus the little-endian length prefix.
pub const RECORD_PREFIX_LEN: usize = 9;

/// Record tags used by this encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordTag {
    /// Object order (log2 of the object size).
    Order = b'O',
    /// Image feature bitmask.
    Features = b'T',
    /// Stripe unit in bytes.
    StripeUnit = b'U',
    /// Stripe count.
    StripeCount = b'C',
    /// Image size in bytes.
    Size = b's',
    /// Updated data region.
    Write = b'w',
}

impl From<RecordTag> for u8 {
    fn from(tag: RecordTag) -> Self {
        tag as u8
    }
}

/// Builds the 9-byte prefix for a record carrying `payload_len` bytes.
pub fn record_prefix(tag: u8, payload_len: u64) -> [u8; RECORD_PREFIX_LEN] {
    let mut prefix = [0u8; RECORD_PREFIX_LEN];
    prefix[0] = tag;
    prefix[1..].copy_from_slice(&payload_len.to_le_bytes());
    prefix
}

/// Frames `payload` as a record with the given tag.
pub fn frame_record(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_PREFIX_LEN + payload.len());
    buf.extend_from_slice(&record_prefix(tag, payload.len() as u64));
    buf.extend_from_slice(payload);
    buf
}

/// Frames a single little-endian u64 as a record.
pub fn u64_record(tag: u8, value: u64) -> Vec<u8> {
    frame_record(tag, &value.to_le_bytes())
}

/// Writes a framed record directly to `writer`.
pub fn write_record<W: Write + ?Sized>(writer: &mut W, tag: u8, payload: &[u8]) -> io::Result<()> {
    writer.write_all(&record_prefix(tag, payload.len() as u64))?;
    writer.write_all(payload)
}
