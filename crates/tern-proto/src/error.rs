//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding or parsing protocol lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An I/O error from the underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line exceeded the protocol's maximum length.
    #[error("message too long: {actual} bytes (limit {limit})")]
    MessageTooLong {
        /// Observed line length in bytes.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// A line was not valid UTF-8.
    #[error("invalid utf-8 at byte {byte_pos}")]
    InvalidUtf8 {
        /// Offset of the first invalid byte.
        byte_pos: usize,
    },

    /// A line could not be parsed as an IRC message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Convenience result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
