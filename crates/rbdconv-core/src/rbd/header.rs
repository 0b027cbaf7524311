//! Stream header and footer.
//!
//! A full-image diff opens with an image header (v2 export metadata), a
//! diffs banner carrying the diff count, and a single diff header declaring
//! the image size. The stream closes with a single end byte.

use std::io::{self, Write};

use super::record::{u64_record, RecordTag};

/// Banner opening the image metadata section.
pub const IMAGE_BANNER: &[u8] = b"rbd image v2\n";

/// Banner opening the list of diffs.
pub const IMAGE_DIFFS_BANNER: &[u8] = b"rbd image diffs v2\n";

/// Banner opening a single diff.
pub const DIFF_BANNER: &[u8] = b"rbd diff v2\n";

/// Terminates the image metadata section.
pub const IMAGE_HEADER_END: u8 = b'E';

/// Terminates the diff (the whole stream, since only one diff is emitted).
pub const DIFF_END: u8 = b'e';

/// Number of diffs following the diffs banner.
pub const DIFF_COUNT: u64 = 1;

/// Default object order (4 MiB objects).
pub const DEFAULT_ORDER: u8 = 22;

/// Smallest accepted order (one 4 KiB block per object).
pub const MIN_ORDER: u8 = 12;

/// Largest accepted order (32 MiB objects).
pub const MAX_ORDER: u8 = 25;

/// Image may have clones layered on top of it.
pub const FEATURE_LAYERING: u64 = 1 << 0;
/// Only one client may write to the image at a time.
pub const FEATURE_EXCLUSIVE_LOCK: u64 = 1 << 2;
/// An object map tracks which objects exist.
pub const FEATURE_OBJECT_MAP: u64 = 1 << 3;
/// Object map entries record whether an object changed.
pub const FEATURE_FAST_DIFF: u64 = 1 << 4;
/// Flattening also detaches snapshots from the parent.
pub const FEATURE_DEEP_FLATTEN: u64 = 1 << 5;

/// Feature set declared for every image (61).
pub const DEFAULT_FEATURES: u64 = FEATURE_LAYERING
    | FEATURE_EXCLUSIVE_LOCK
    | FEATURE_OBJECT_MAP
    | FEATURE_FAST_DIFF
    | FEATURE_DEEP_FLATTEN;

/// Metadata written at the start of every stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    /// Object order.
    pub order: u8,
    /// Feature bitmask.
    pub features: u64,
    /// Stripe unit in bytes (`1 << order`).
    pub stripe_unit: u64,
    /// Stripe count.
    pub stripe_count: u64,
    /// Declared image size in bytes.
    pub size: u64,
}

impl ImageHeader {
    /// Creates a header for an image of `size` bytes with `1 << order` objects.
    ///
    /// The order is not range-checked here; [`validate_layout`] does that.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `order` is 64 or more.
    ///
    /// [`validate_layout`]: crate::rbd::validate_layout
    pub fn new(order: u8, size: u64) -> Self {
        Self {
            order,
            features: DEFAULT_FEATURES,
            stripe_unit: 1u64 << order,
            stripe_count: 1,
            size,
        }
    }

    /// Serializes the complete header, from the image banner up to and
    /// including the size record of the diff.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);

        buf.extend_from_slice(IMAGE_BANNER);
        buf.extend(u64_record(RecordTag::Order.into(), u64::from(self.order)));
        buf.extend(u64_record(RecordTag::Features.into(), self.features));
        buf.extend(u64_record(RecordTag::StripeUnit.into(), self.stripe_unit));
        buf.extend(u64_record(RecordTag::StripeCount.into(), self.stripe_count));
        buf.push(IMAGE_HEADER_END);

        // Diffs banner is followed by a raw count, not a record
        buf.extend_from_slice(IMAGE_DIFFS_BANNER);
        buf.extend_from_slice(&DIFF_COUNT.to_le_bytes());

        buf.extend_from_slice(DIFF_BANNER);
        buf.extend(u64_record(RecordTag::Size.into(), self.size));

        buf
    }

    /// Writes the serialized header to `writer`.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

/// Writes the end-of-stream marker.
pub fn write_footer<W: Write + ?Sized>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&[DIFF_END])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_features_value() {
        assert_eq!(DEFAULT_FEATURES, 61);
        assert_eq!(DEFAULT_FEATURES & (1 << 1), 0, "striping v2 is not declared");
    }

    #[test]
    fn test_header_new() {
        let header = ImageHeader::new(DEFAULT_ORDER, 8192);
        assert_eq!(header.stripe_unit, 4 * 1024 * 1024);
        assert_eq!(header.stripe_count, 1);
        assert_eq!(header.features, 61);
        assert_eq!(header.size, 8192);
    }

    #[test]
    fn test_header_starts_with_banner() {
        let bytes = ImageHeader::new(22, 4096).to_bytes();
        assert!(bytes.starts_with(b"rbd image v2\n"));
        // Four u64 records follow the banner, then 'E'
        let end = IMAGE_BANNER.len() + 4 * 17;
        assert_eq!(bytes[end], b'E');
    }

    #[test]
    fn test_header_length() {
        let bytes = ImageHeader::new(22, 4096).to_bytes();
        let expected = IMAGE_BANNER.len()
            + 4 * 17
            + 1
            + IMAGE_DIFFS_BANNER.len()
            + 8
            + DIFF_BANNER.len()
            + 17;
        assert_eq!(bytes.len(), expected);
    }

    #[test]
    fn test_header_ends_with_size_record() {
        let size = 3 * 4096u64;
        let bytes = ImageHeader::new(22, size).to_bytes();
        let tail = &bytes[bytes.len() - 17..];
        assert_eq!(tail[0], b's');
        assert_eq!(&tail[1..9], &8u64.to_le_bytes());
        assert_eq!(&tail[9..], &size.to_le_bytes());
    }

    #[test]
    fn test_footer() {
        let mut out = Vec::new();
        write_footer(&mut out).unwrap();
        assert_eq!(out, b"e");
    }
}
