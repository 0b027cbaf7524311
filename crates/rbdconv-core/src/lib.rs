//! rbdconv Core Library
//!
//! This crate converts raw, block-aligned disk images into RBD export-diff
//! (v2) streams that can be imported as a full-image snapshot diff.
//!
//! # Overview
//!
//! Input is cut into power-of-two stripes (4 MiB by default). Stripes that
//! are entirely zero are left out; every other stripe is trimmed of trailing
//! zeros, padded up to a 4096-byte boundary and framed as a write record.
//! The stream is wrapped in the export header and end marker, and usually
//! compressed with xz.
//!
//! # Modules
//!
//! - [`error`] - Error types and Result alias
//! - [`rbd`] - Wire format: records, header/footer, stripe buffering, sparse encoding, the encoder
//! - [`compress`] - Compressing output sinks (xz, gzip)
//! - [`actor`] - Encoder thread fed through a channel, for multiple producers
//! - [`convert`] - Top-level conversion with size detection and progress reporting
//!
//! # Quick Start
//!
//! ```no_run
//! use rbdconv_core::{raw_to_rbd, ConvertOptions};
//! use std::fs::File;
//!
//! let input = File::open("/path/to/disk.raw").unwrap();
//! let output = File::create("/path/to/disk.rbd.xz").unwrap();
//!
//! raw_to_rbd(input, output, &ConvertOptions::default(), None).unwrap();
//! ```

pub mod actor;
pub mod compress;
pub mod convert;
pub mod error;
pub mod rbd;

pub use error::{Error, Result};

// Re-export main conversion functionality for convenience
pub use convert::{
    convert_file, convert_stream, determine_size, raw_to_rbd, ConvertOptions, ConvertPhase,
    ConvertProgress, ConvertSummary, ProgressCallback, DEFAULT_CHUNK_SIZE,
};

pub use compress::{Codec, CompressionLevel};
pub use rbd::{EncodeStats, RbdWriter};
