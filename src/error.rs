use std::io;

use thiserror::Error;

/// A convenience `Result` type for TSF read operations.
pub type Result<T> = std::result::Result<T, TsfError>;

/// The error type for TSF read operations.
#[derive(Debug, Error)]
pub enum TsfError {
    /// The file is not a TSF file, or its header, index, or trailer is
    /// malformed. Fatal to `open`.
    #[error("invalid tsf file: {0}")]
    BadFormat(String),

    /// A block's stored checksum does not match its payload.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum stored ahead of the block payload.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// The reader has been closed, or a block read fell outside the mapping.
    #[error("tsf file closed")]
    Closed,

    /// The key does not exist in the index.
    #[error("key does not exist: {0}")]
    KeyNotFound(String),

    /// A block payload could not be decoded.
    #[error("block decode: {0}")]
    Decode(String),

    /// The tombstone sidecar could not be read or appended to.
    #[error("tombstone: {0}")]
    Tombstone(String),

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}
