//! Error types for the rbdconv core library.

use std::path::PathBuf;

/// The main error type for rbdconv operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// Declared image size is not a multiple of the block size.
    #[error("filesize {size} is not blocksize aligned (blocksize={block_size})")]
    UnalignedSize { size: u64, block_size: u64 },

    /// Stripe order outside the range the export format accepts.
    #[error("invalid stripe order {order} (expected 12..=25)")]
    InvalidOrder { order: u8 },

    /// The input length could not be determined.
    #[error("could not determine input size: {message}")]
    SizeUnknown { message: String },

    /// More bytes were written than the declared image size.
    #[error("input exceeds declared size: {attempted} bytes written, {declared} declared")]
    SizeExceeded { declared: u64, attempted: u64 },

    /// The background encoder stopped before the stream was finished.
    #[error("Encoder error: {message}")]
    Encoder { message: String },
}

/// A specialized Result type for rbdconv operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create a size determination error.
    pub fn size_unknown(message: impl Into<String>) -> Self {
        Self::SizeUnknown {
            message: message.into(),
        }
    }

    /// Create an encoder error.
    pub fn encoder(message: impl Into<String>) -> Self {
        Self::Encoder {
            message: message.into(),
        }
    }

    /// Returns true for errors raised while validating the image layout,
    /// before any output was produced.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnalignedSize { .. } | Self::InvalidOrder { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io { source, path: None } => source,
            other => std::io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io(io_err, "/path/to/disk.raw");
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("/path/to/disk.raw"));
    }

    #[test]
    fn test_io_error_without_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io_simple(io_err);
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(!msg.contains("at '"));
    }

    #[test]
    fn test_unaligned_size_error() {
        let err = Error::UnalignedSize {
            size: 4097,
            block_size: 4096,
        };
        assert!(err.to_string().contains("4097"));
        assert!(err.to_string().contains("blocksize=4096"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_size_unknown_error() {
        let err = Error::size_unknown("failed to seek input");
        assert!(err.to_string().contains("could not determine input size"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_encoder_error() {
        let err = Error::encoder("thread panicked");
        assert!(err.to_string().contains("Encoder error"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { path: None, .. }));
    }

    #[test]
    fn test_into_io_error_unwraps_plain_io() {
        let err = Error::io_simple(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        let io_err: std::io::Error = err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
