//! Stripe-aligned buffering of an input byte stream.

use crate::error::Result;

/// Accumulates arbitrary-length writes and hands out complete stripes in
/// arrival order, each tagged with the image offset it starts at.
///
/// Bytes short of a full stripe stay pending until [`StripeBuffer::flush`].
#[derive(Debug)]
pub struct StripeBuffer {
    stripe_size: usize,
    pending: Vec<u8>,
    /// Offset of the first pending byte.
    offset: u64,
}

impl StripeBuffer {
    /// Creates an empty buffer yielding stripes of `stripe_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `stripe_size` is zero.
    pub fn new(stripe_size: usize) -> Self {
        assert!(stripe_size > 0, "stripe size must be non-zero");
        Self {
            stripe_size,
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// Stripe size in bytes.
    #[inline]
    pub fn stripe_size(&self) -> usize {
        self.stripe_size
    }

    /// Offset at which the next yielded stripe begins.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes waiting for a full stripe.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total bytes accepted so far, yielded or pending.
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.offset + self.pending.len() as u64
    }

    /// Appends `data` and calls `sink` once for every stripe it completes.
    ///
    /// Stripes are passed in order together with their starting offset. If
    /// `sink` fails, the offset already accounts for the failed stripe and the
    /// error is returned immediately.
    pub fn push<F>(&mut self, mut data: &[u8], mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8], u64) -> Result<()>,
    {
        if !self.pending.is_empty() {
            let take = (self.stripe_size - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() < self.stripe_size {
                return Ok(());
            }

            let offset = self.advance(self.stripe_size);
            let result = sink(&self.pending, offset);
            self.pending.clear();
            result?;
        }

        // Whole stripes straight from the caller's slice
        let mut stripes = data.chunks_exact(self.stripe_size);
        for stripe in &mut stripes {
            let offset = self.advance(self.stripe_size);
            sink(stripe, offset)?;
        }

        self.pending.extend_from_slice(stripes.remainder());
        Ok(())
    }

    /// Yields the pending bytes (possibly none) as a final short stripe.
    pub fn flush<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8], u64) -> Result<()>,
    {
        let residual = std::mem::take(&mut self.pending);
        let offset = self.advance(residual.len());
        sink(&residual, offset)
    }

    fn advance(&mut self, len: usize) -> u64 {
        let offset = self.offset;
        self.offset += len as u64;
        offset
    }
}
