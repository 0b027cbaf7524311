//! Streaming export-diff encoder.

use std::io::{self, Write};

use tracing::{debug, trace, warn};

use super::header::{write_footer, ImageHeader, DEFAULT_ORDER, MAX_ORDER, MIN_ORDER};
use super::sparse::{encode_stripe, BLOCK_SIZE};
use super::stripe::StripeBuffer;
use crate::error::{Error, Result};

/// Counters collected while encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Input bytes consumed.
    pub bytes_consumed: u64,
    /// Stripes processed, including the final short one.
    pub stripes: u64,
    /// Stripes elided because they held only zeros.
    pub sparse_stripes: u64,
    /// Write records emitted.
    pub records: u64,
    /// Payload bytes carried by write records.
    pub payload_bytes: u64,
}

/// Encodes a raw image stream as a full-image RBD export-diff (v2).
///
/// The header is written on construction. Data is accepted in chunks of any
/// size through [`RbdWriter::write_data`] or the [`Write`] impl; every
/// completed stripe is encoded and handed to the underlying writer before
/// the call returns. [`RbdWriter::finish`] flushes the last partial stripe and
/// writes the end marker.
///
/// # Example
///
/// ```
/// use rbdconv_core::rbd::RbdWriter;
///
/// let mut writer = RbdWriter::new(Vec::new(), 8192).unwrap();
/// writer.write_data(&[0xAB; 4096]).unwrap();
/// writer.write_data(&[0u8; 4096]).unwrap();
/// let (output, stats) = writer.finish().unwrap();
///
/// assert!(output.starts_with(b"rbd image v2\n"));
/// assert_eq!(output.last(), Some(&b'e'));
/// assert_eq!(stats.records, 1);
/// ```
pub struct RbdWriter<W: Write> {
    writer: W,
    header: ImageHeader,
    buffer: StripeBuffer,
    stats: EncodeStats,
}

impl<W: Write> RbdWriter<W> {
    /// Creates an encoder for an image of `size` bytes using 4 MiB stripes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnalignedSize`] if `size` is not a multiple of 4096,
    /// or an I/O error if the header cannot be written.
    pub fn new(writer: W, size: u64) -> Result<Self> {
        Self::with_order(writer, size, DEFAULT_ORDER)
    }

    /// Creates an encoder using stripes of `1 << order` bytes.
    ///
    /// Nothing is written unless the order and size are both valid.
    pub fn with_order(mut writer: W, size: u64, order: u8) -> Result<Self> {
        validate_layout(size, order)?;

        let header = ImageHeader::new(order, size);
        header.write_to(&mut writer)?;

        debug!(size, order, stripe_size = header.stripe_unit, "started export-diff stream");

        Ok(Self {
            writer,
            buffer: StripeBuffer::new(header.stripe_unit as usize),
            header,
            stats: EncodeStats::default(),
        })
    }

    /// Declared image size in bytes.
    pub fn size(&self) -> u64 {
        self.header.size
    }

    /// Object order of the stream.
    pub fn order(&self) -> u8 {
        self.header.order
    }

    /// Stripe size in bytes.
    pub fn stripe_size(&self) -> u64 {
        self.header.stripe_unit
    }

    /// Bytes accepted so far, including those not yet encoded.
    pub fn consumed(&self) -> u64 {
        self.buffer.consumed()
    }

    /// Counters for the stripes encoded so far.
    pub fn stats(&self) -> &EncodeStats {
        &self.stats
    }

    /// Accepts the next chunk of image data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeExceeded`] (accepting none of `data`) if the chunk
    /// would run past the declared size, or the first write error from the
    /// underlying writer.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let attempted = self.buffer.consumed() + data.len() as u64;
        if attempted > self.header.size {
            return Err(Error::SizeExceeded {
                declared: self.header.size,
                attempted,
            });
        }

        let Self {
            writer,
            buffer,
            stats,
            ..
        } = self;
        buffer.push(data, |stripe, offset| emit_stripe(writer, stats, stripe, offset))
    }

    /// Encodes the remaining partial stripe, writes the end marker, flushes
    /// and returns the underlying writer.
    pub fn finish(mut self) -> Result<(W, EncodeStats)> {
        let Self {
            writer,
            buffer,
            stats,
            ..
        } = &mut self;
        buffer.flush(|stripe, offset| emit_stripe(writer, stats, stripe, offset))?;

        write_footer(&mut self.writer)?;
        self.writer.flush()?;

        if self.stats.bytes_consumed < self.header.size {
            warn!(
                consumed = self.stats.bytes_consumed,
                declared = self.header.size,
                "input ended before the declared size; the remainder reads as zeros"
            );
        }
        debug!(
            records = self.stats.records,
            sparse_stripes = self.stats.sparse_stripes,
            payload_bytes = self.stats.payload_bytes,
            "finished export-diff stream"
        );

        Ok((self.writer, self.stats))
    }
}

/// Checks that `order` is supported and `size` is block-aligned.
pub fn validate_layout(size: u64, order: u8) -> Result<()> {
    if !(MIN_ORDER..=MAX_ORDER).contains(&order) {
        return Err(Error::InvalidOrder { order });
    }
    if size & (BLOCK_SIZE - 1) != 0 {
        return Err(Error::UnalignedSize {
            size,
            block_size: BLOCK_SIZE,
        });
    }
    Ok(())
}

fn emit_stripe<W: Write>(
    writer: &mut W,
    stats: &mut EncodeStats,
    stripe: &[u8],
    offset: u64,
) -> Result<()> {
    stats.bytes_consumed += stripe.len() as u64;
    if stripe.is_empty() {
        return Ok(());
    }
    stats.stripes += 1;

    match encode_stripe(stripe, offset) {
        Some(entry) => {
            trace!(offset, len = entry.len(), "write record");
            entry.write_to(writer)?;
            stats.records += 1;
            stats.payload_bytes += entry.len();
        }
        None => {
            trace!(offset, "sparse stripe elided");
            stats.sparse_stripes += 1;
        }
    }
    Ok(())
}

impl<W: Write> Write for RbdWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf)?;
        Ok(buf.len())
    }

    /// Flushes the underlying writer. Pending bytes short of a stripe stay
    /// buffered until [`RbdWriter::finish`].
    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
