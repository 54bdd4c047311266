//! Protocol error types.

use thiserror::Error;

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing, parsing or validating messages.
///
/// None of these are fatal for the connection that produced them. The server
/// logs the error, drops the offending frame and keeps reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame exceeds the fixed size limit for its direction.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Actual size in bytes, delimiter included
        size: usize,
        /// Limit that was exceeded
        max: usize,
    },

    /// Frame bytes are not a valid JSON document.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame parsed as JSON but is not an object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Human-readable expected type
        expected: &'static str,
    },

    /// The `type` field names a message kind the server does not handle.
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    /// Document could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}
