//! RBD export-diff v2 encoding.
//!
//! This module turns a raw image byte stream into a single full-image diff:
//! a fixed header, one write record per non-zero stripe, and an end marker.

pub mod header;
pub mod record;
pub mod sparse;
pub mod stripe;
pub mod writer;

pub use header::{
    write_footer, ImageHeader, DEFAULT_FEATURES, DEFAULT_ORDER, DIFF_BANNER, IMAGE_BANNER,
    IMAGE_DIFFS_BANNER, MAX_ORDER, MIN_ORDER,
};
pub use record::{frame_record, u64_record, write_record, RecordTag, RECORD_PREFIX_LEN};
pub use sparse::{encode_stripe, WriteEntry, BLOCK_SIZE, WRITE_HEADER_LEN};
pub use stripe::StripeBuffer;
pub use writer::{validate_layout, EncodeStats, RbdWriter};
