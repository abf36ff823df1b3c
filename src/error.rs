//! Error types for segwal.

use std::io;
use thiserror::Error;

/// Result type alias for segwal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for WAL operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// The segment or WAL has already been closed.
    #[error("the segment file is closed")]
    Closed,

    /// Chunk checksum mismatch.
    #[error("invalid crc, the data may be corrupted: expected {expected:#x}, got {actual:#x}")]
    InvalidCrc { expected: u32, actual: u32 },

    /// Structural damage in a segment file.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// A single record can never fit in one segment.
    #[error("Value too large: {size} bytes (segment size: {max})")]
    ValueTooLarge { size: u64, max: u64 },

    /// The pending batch can never fit in one segment.
    #[error("Pending writes too large: {size} bytes (segment size: {max})")]
    PendingSizeTooLarge { size: u64, max: u64 },

    /// The position refers to a segment this WAL does not hold.
    #[error("segment file {segment_id:09}{ext} not found")]
    SegmentNotFound { segment_id: u32, ext: String },

    /// A positional read started past the end of the segment.
    #[error("position out of range: segment {segment_id}, block {block_number}, offset {chunk_offset}")]
    PositionOutOfRange {
        segment_id: u32,
        block_number: u32,
        chunk_offset: i64,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Bytes that do not decode to the expected structure.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create an invalid format error.
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Check if this error indicates corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Corruption(_) | Error::InvalidCrc { .. } | Error::InvalidFormat(_)
        )
    }

    /// Check if this error was caused by a closed segment or WAL.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad data");
        assert_eq!(format!("{}", err), "Corruption detected: bad data");

        let err = Error::ValueTooLarge {
            size: 1000,
            max: 100,
        };
        assert_eq!(
            format!("{}", err),
            "Value too large: 1000 bytes (segment size: 100)"
        );

        let err = Error::SegmentNotFound {
            segment_id: 7,
            ext: ".SEG".into(),
        };
        assert_eq!(format!("{}", err), "segment file 000000007.SEG not found");
    }

    #[test]
    fn test_error_is_corruption() {
        assert!(Error::corruption("bad").is_corruption());
        assert!(Error::InvalidCrc {
            expected: 1,
            actual: 2
        }
        .is_corruption());
        assert!(Error::invalid_format("short").is_corruption());
        assert!(!Error::Closed.is_corruption());
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "disk full").into();
        assert_eq!(err, Error::Io("disk full".into()));
        assert!(!err.is_closed());
        assert!(Error::Closed.is_closed());
    }
}
