//! Output compression.
//!
//! The encoder writes into any [`Write`]; this module provides the
//! compressing sinks placed between the encoder and the destination.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use flate2::write::GzEncoder;
use flate2::Compression;
use xz2::write::XzEncoder;

use crate::error::Result;

/// Compression level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Fastest compression (level 1).
    Fast,
    /// Balanced speed and ratio (level 6).
    #[default]
    Balanced,
    /// Best ratio (level 9).
    Max,
}

impl CompressionLevel {
    /// Numeric level understood by both xz and gzip.
    pub fn to_level(self) -> u32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 6,
            CompressionLevel::Max => 9,
        }
    }
}

/// Container format of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// xz stream, the format downstream import tooling expects.
    #[default]
    Xz,
    /// gzip stream.
    Gzip,
    /// Uncompressed export-diff.
    None,
}

impl Codec {
    /// Conventional file extension, without the dot.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Codec::Xz => Some("xz"),
            Codec::Gzip => Some("gz"),
            Codec::None => None,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Xz => write!(f, "xz"),
            Codec::Gzip => write!(f, "gzip"),
            Codec::None => write!(f, "none"),
        }
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xz" => Ok(Codec::Xz),
            "gzip" | "gz" => Ok(Codec::Gzip),
            "none" | "raw" => Ok(Codec::None),
            other => Err(format!("unknown codec '{}'", other)),
        }
    }
}

/// A writer that compresses everything passing through it.
pub enum CompressedWriter<W: Write> {
    Xz(XzEncoder<W>),
    Gzip(GzEncoder<W>),
    Plain(W),
}

impl<W: Write> CompressedWriter<W> {
    /// Wraps `writer` with the given codec and level.
    pub fn new(writer: W, codec: Codec, level: CompressionLevel) -> Self {
        match codec {
            Codec::Xz => CompressedWriter::Xz(XzEncoder::new(writer, level.to_level())),
            Codec::Gzip => {
                CompressedWriter::Gzip(GzEncoder::new(writer, Compression::new(level.to_level())))
            }
            Codec::None => CompressedWriter::Plain(writer),
        }
    }

    /// Codec in use.
    pub fn codec(&self) -> Codec {
        match self {
            CompressedWriter::Xz(_) => Codec::Xz,
            CompressedWriter::Gzip(_) => Codec::Gzip,
            CompressedWriter::Plain(_) => Codec::None,
        }
    }

    /// Completes the compressed stream and returns the inner writer.
    pub fn finish(self) -> Result<W> {
        let mut inner = match self {
            CompressedWriter::Xz(encoder) => encoder.finish()?,
            CompressedWriter::Gzip(encoder) => encoder.finish()?,
            CompressedWriter::Plain(writer) => writer,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Xz(encoder) => encoder.write(buf),
            CompressedWriter::Gzip(encoder) => encoder.write(buf),
            CompressedWriter::Plain(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Xz(encoder) => encoder.flush(),
            CompressedWriter::Gzip(encoder) => encoder.flush(),
            CompressedWriter::Plain(writer) => writer.flush(),
        }
    }
}
