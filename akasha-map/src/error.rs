//! Error types for map file I/O.

use thiserror::Error;

/// Error type for reading and writing map files
#[derive(Error, Debug)]
pub enum MapIoError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed contents
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected format version
        expected: u8,
        /// Found format version
        found: u8,
    },

    /// File name does not select a known format
    #[error("Unsupported map file extension {0:?} (expected .ot or .bt)")]
    UnsupportedExtension(String),
}

/// Result alias for map I/O.
pub type Result<T> = std::result::Result<T, MapIoError>;
