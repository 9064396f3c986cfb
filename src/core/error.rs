//! Error types for the link.

use thiserror::Error;

/// Errors produced by the frame codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Payload length does not fit the seven-digit length field.
    #[error("payload too large: {len} bytes (limit {limit})")]
    TooLarge {
        /// Offending payload length.
        len: usize,
        /// Exclusive upper bound.
        limit: usize,
    },
}

/// Errors from parsing a hardware address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Wrong overall shape (length or separators).
    #[error("malformed address: {0:?}")]
    Malformed(String),

    /// Contains a character that is not an upper-case hex digit.
    #[error("invalid hex digit in address: {0:?}")]
    InvalidDigit(String),
}

/// Top-level link errors.
///
/// Only returned by operations that validate their input before touching the
/// connection state; runtime failures are reported as events instead.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Address failed validation.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Address is valid but the adapter does not know the peer.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been shut down.
    #[error("link shut down")]
    Shutdown,
}

/// Result type for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
