//! Raw image to export-diff conversion.
//!
//! This module drives the full conversion:
//! 1. Determine the input size (by seeking, or as declared by the caller)
//! 2. Wrap the destination in the configured compression codec
//! 3. Stream the input through an [`RbdWriter`] in fixed-size reads
//! 4. Finish the diff, then the compressed stream
//!
//! # Example
//!
//! ```no_run
//! use rbdconv_core::convert::{convert_file, ConvertOptions};
//! use std::path::Path;
//!
//! let summary = convert_file(
//!     Path::new("/path/to/disk.raw"),
//!     Path::new("/path/to/disk.rbd.xz"),
//!     None,
//!     &ConvertOptions::default(),
//!     None,
//! )
//! .unwrap();
//! println!("{} write records", summary.stats.records);
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::compress::{Codec, CompressedWriter, CompressionLevel};
use crate::error::{Error, Result};
use crate::rbd::{validate_layout, EncodeStats, RbdWriter, DEFAULT_ORDER};

/// Default read size (one 4 MiB stripe).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Path understood as standard input by [`convert_file`].
pub const STDIN_PATH: &str = "-";

/// Options for a conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Object order of the image (stripe size is `1 << order`).
    pub order: u8,
    /// Output codec.
    pub codec: Codec,
    /// Compression level for the codec.
    pub compression: CompressionLevel,
    /// Size of each read from the input.
    pub chunk_size: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            codec: Codec::Xz,
            compression: CompressionLevel::Balanced,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ConvertOptions {
    /// Sets the object order.
    pub fn with_order(mut self, order: u8) -> Self {
        self.order = order;
        self
    }

    /// Sets the output codec.
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the compression level.
    pub fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the read size; zero falls back to the default.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }
}

/// Phase of the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertPhase {
    /// Size determined, header written.
    Header,
    /// Streaming input through the encoder.
    Encoding,
    /// Writing the end marker and closing the compressed stream.
    Finalizing,
    /// Conversion complete.
    Complete,
}

impl std::fmt::Display for ConvertPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertPhase::Header => write!(f, "Header"),
            ConvertPhase::Encoding => write!(f, "Encoding"),
            ConvertPhase::Finalizing => write!(f, "Finalizing"),
            ConvertPhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Progress information for a conversion.
#[derive(Debug, Clone)]
pub struct ConvertProgress {
    /// Current phase.
    pub phase: ConvertPhase,
    /// Input bytes consumed so far.
    pub bytes_processed: u64,
    /// Declared image size.
    pub bytes_total: u64,
}

impl ConvertProgress {
    /// Percentage of the declared size consumed.
    pub fn percent_complete(&self) -> f64 {
        if self.bytes_total == 0 {
            return match self.phase {
                ConvertPhase::Complete => 100.0,
                _ => 0.0,
            };
        }
        (self.bytes_processed as f64 / self.bytes_total as f64) * 100.0
    }
}

/// Type alias for the progress callback function.
pub type ProgressCallback = Box<dyn Fn(ConvertProgress) + Send>;

/// Result of a finished conversion.
#[derive(Debug, Clone)]
pub struct ConvertSummary {
    /// Image size declared in the header.
    pub declared_size: u64,
    /// Codec used for the output.
    pub codec: Codec,
    /// Encoder counters.
    pub stats: EncodeStats,
}

impl ConvertSummary {
    /// Fraction of stripes elided as all-zero.
    pub fn sparse_ratio(&self) -> f64 {
        if self.stats.stripes == 0 {
            return 0.0;
        }
        self.stats.sparse_stripes as f64 / self.stats.stripes as f64
    }
}

/// Determines the length of `source` by seeking to its end, then rewinds it.
///
/// # Errors
///
/// Returns [`Error::SizeUnknown`] if the source cannot seek (pipes, sockets).
pub fn determine_size<S: Seek + ?Sized>(source: &mut S) -> Result<u64> {
    let size = source
        .seek(SeekFrom::End(0))
        .map_err(|e| Error::size_unknown(format!("failed to seek input: {}", e)))?;
    source
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::size_unknown(format!("failed to rewind input: {}", e)))?;
    Ok(size)
}

/// Converts a seekable raw image to a compressed export-diff.
///
/// The image size is taken from the input's length. The destination is
/// written through the codec in `options` and flushed, but not closed.
pub fn raw_to_rbd<R, W>(
    mut reader: R,
    writer: W,
    options: &ConvertOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<ConvertSummary>
where
    R: Read + Seek,
    W: Write,
{
    let size = determine_size(&mut reader)?;
    convert_stream(reader, writer, size, options, progress_callback)
}

/// Converts a raw image stream of a declared `size` to a compressed export-diff.
///
/// Input shorter than `size` leaves the tail of the image as zeros; input
/// longer than `size` fails with [`Error::SizeExceeded`].
pub fn convert_stream<R, W>(
    mut reader: R,
    writer: W,
    size: u64,
    options: &ConvertOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<ConvertSummary>
where
    R: Read,
    W: Write,
{
    let report_progress = |progress: ConvertProgress| {
        if let Some(ref callback) = progress_callback {
            callback(progress);
        }
    };

    // Reject the layout before the codec can emit any framing
    validate_layout(size, options.order)?;

    let sink = CompressedWriter::new(writer, options.codec, options.compression);
    let mut encoder = RbdWriter::with_order(sink, size, options.order)?;

    let mut progress = ConvertProgress {
        phase: ConvertPhase::Header,
        bytes_processed: 0,
        bytes_total: size,
    };
    report_progress(progress.clone());

    debug!(size, order = options.order, codec = %options.codec, "encoding image");
    progress.phase = ConvertPhase::Encoding;

    let mut buf = vec![0u8; options.chunk_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        encoder.write_data(&buf[..n])?;

        progress.bytes_processed = encoder.consumed();
        report_progress(progress.clone());
    }

    progress.phase = ConvertPhase::Finalizing;
    report_progress(progress.clone());

    let (sink, stats) = encoder.finish()?;
    sink.finish()?;

    progress.phase = ConvertPhase::Complete;
    report_progress(progress);

    info!(
        size,
        records = stats.records,
        sparse_stripes = stats.sparse_stripes,
        "conversion complete"
    );

    Ok(ConvertSummary {
        declared_size: size,
        codec: options.codec,
        stats,
    })
}

/// Converts the raw image at `input` into a new file at `output`.
///
/// `size` overrides the declared image size; it is required when `input` is
/// `-` (standard input), which cannot be measured by seeking.
pub fn convert_file(
    input: &Path,
    output: &Path,
    size: Option<u64>,
    options: &ConvertOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<ConvertSummary> {
    if input == Path::new(STDIN_PATH) {
        let size = size.ok_or_else(|| {
            Error::size_unknown("standard input cannot be measured; declare a size")
        })?;
        let out = create_output(output)?;
        return convert_stream(io::stdin().lock(), out, size, options, progress_callback);
    }

    let mut file = File::open(input).map_err(|e| Error::io(e, input))?;
    let size = match size {
        Some(size) => size,
        None => determine_size(&mut file)?,
    };

    info!(input = %input.display(), output = %output.display(), size, "converting image");

    let out = create_output(output)?;
    convert_stream(file, out, size, options, progress_callback)
}

fn create_output(output: &Path) -> Result<BufWriter<File>> {
    let file = File::create(output).map_err(|e| Error::io(e, output))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_default_options() {
        let options = ConvertOptions::default();
        assert_eq!(options.order, 22);
        assert_eq!(options.codec, Codec::Xz);
        assert_eq!(options.compression, CompressionLevel::Balanced);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_option_setters() {
        let options = ConvertOptions::default()
            .with_order(16)
            .with_codec(Codec::Gzip)
            .with_compression(CompressionLevel::Fast)
            .with_chunk_size(0);
        assert_eq!(options.order, 16);
        assert_eq!(options.codec, Codec::Gzip);
        assert_eq!(options.compression, CompressionLevel::Fast);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_determine_size_rewinds() {
        let mut cursor = Cursor::new(vec![0u8; 12288]);
        cursor.set_position(100);
        assert_eq!(determine_size(&mut cursor).unwrap(), 12288);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_progress_percent() {
        let progress = ConvertProgress {
            phase: ConvertPhase::Encoding,
            bytes_processed: 2048,
            bytes_total: 8192,
        };
        assert_eq!(progress.percent_complete(), 25.0);

        let empty = ConvertProgress {
            phase: ConvertPhase::Complete,
            bytes_processed: 0,
            bytes_total: 0,
        };
        assert_eq!(empty.percent_complete(), 100.0);
    }

    #[test]
    fn test_sparse_ratio() {
        let summary = ConvertSummary {
            declared_size: 4 * 4096,
            codec: Codec::None,
            stats: EncodeStats {
                stripes: 4,
                sparse_stripes: 1,
                ..EncodeStats::default()
            },
        };
        assert_eq!(summary.sparse_ratio(), 0.25);
    }
}
