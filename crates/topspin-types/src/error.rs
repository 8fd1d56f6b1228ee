//! Error types for data parsing in topspin-types.

use thiserror::Error;

/// Errors that can occur when parsing tracker data.
///
/// This error type is platform-agnostic and does not include BLE- or
/// network-specific errors (those belong in topspin-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// Payload did not have the expected length.
    #[error("Invalid payload length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected payload size in bytes.
        expected: usize,
        /// Actual payload size received.
        actual: usize,
    },

    /// A field value could not be interpreted.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using topspin-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
