//! Error types for the segkv storage engine.

use std::fmt;
use std::io;

/// The result type used throughout segkv.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for store operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred.
    Io(io::Error),

    /// Data corruption was detected.
    Corruption(String),

    /// A record's value does not hash to its stored checksum.
    ChecksumMismatch {
        /// The checksum stored alongside the record.
        expected: [u8; 20],
        /// The checksum computed from the decoded value.
        actual: [u8; 20],
    },

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// The store is in the wrong state for the requested operation.
    InvalidState(String),

    /// An internal error occurred.
    Internal(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Creates a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

fn write_digest(f: &mut fmt::Formatter<'_>, digest: &[u8; 20]) -> fmt::Result {
    for byte in digest {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Corruption(msg) => write!(f, "Data corruption: {}", msg),
            Error::ChecksumMismatch { expected, actual } => {
                write!(f, "Checksum mismatch: expected ")?;
                write_digest(f, expected)?;
                write!(f, ", got ")?;
                write_digest(f, actual)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("test corruption");
        assert_eq!(err.to_string(), "Data corruption: test corruption");

        let err = Error::invalid_state("store is closed");
        assert_eq!(err.to_string(), "Invalid state: store is closed");
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = Error::ChecksumMismatch { expected: [0xab; 20], actual: [0x01; 20] };
        let text = err.to_string();
        assert!(text.contains(&"ab".repeat(20)));
        assert!(text.contains(&"01".repeat(20)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
