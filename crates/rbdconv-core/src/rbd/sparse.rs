//! Sparse stripe encoding.
//!
//! Each stripe becomes at most one write record. Trailing zeros are trimmed
//! and the remaining length is rounded up to the block size; a stripe that is
//! entirely zero produces no record, since the consumer treats regions
//! without records as zero.

use std::borrow::Cow;
use std::io::{self, Write};

use super::record::{record_prefix, RecordTag};

/// Alignment of every write record payload.
pub const BLOCK_SIZE: u64 = 4096;

/// Size of the `{length + 16, offset, length}` write header.
pub const WRITE_HEADER_LEN: usize = 24;

/// A non-sparse region to be written to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntry<'a> {
    /// Absolute image offset of the first byte.
    pub offset: u64,
    /// Payload, always a multiple of [`BLOCK_SIZE`] long.
    pub data: Cow<'a, [u8]>,
}

impl WriteEntry<'_> {
    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Serializes the 24-byte write header.
    pub fn header(&self) -> [u8; WRITE_HEADER_LEN] {
        let len = self.len();
        let mut buf = [0u8; WRITE_HEADER_LEN];
        buf[0..8].copy_from_slice(&(len + 16).to_le_bytes());
        buf[8..16].copy_from_slice(&self.offset.to_le_bytes());
        buf[16..24].copy_from_slice(&len.to_le_bytes());
        buf
    }

    /// Writes the framed `'w'` record followed by the payload.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&record_prefix(
            RecordTag::Write.into(),
            WRITE_HEADER_LEN as u64,
        ))?;
        writer.write_all(&self.header())?;
        writer.write_all(&self.data)
    }
}

/// Length of `stripe` once trailing zero bytes are removed.
pub fn trimmed_len(stripe: &[u8]) -> usize {
    stripe.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1)
}

/// Rounds `len` up to the next multiple of [`BLOCK_SIZE`].
pub fn align_up(len: u64) -> u64 {
    (len + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE
}

/// Decides how to emit one stripe starting at `offset`.
///
/// Returns `None` for an all-zero (or empty) stripe. Otherwise the payload is
/// the stripe sliced to the aligned length, reusing the stripe's own bytes as
/// padding. Only a short final stripe whose length is not block-aligned can
/// need more bytes than it holds; that tail is zero-filled.
pub fn encode_stripe(stripe: &[u8], offset: u64) -> Option<WriteEntry<'_>> {
    let len = trimmed_len(stripe);
    if len == 0 {
        return None;
    }

    let aligned = align_up(len as u64) as usize;
    let data = if aligned <= stripe.len() {
        Cow::Borrowed(&stripe[..aligned])
    } else {
        let mut padded = Vec::with_capacity(aligned);
        padded.extend_from_slice(stripe);
        padded.resize(aligned, 0);
        Cow::Owned(padded)
    };

    Some(WriteEntry { offset, data })
}
