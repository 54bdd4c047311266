//! Turnstile wire protocol.
//!
//! Every application message is a JSON object followed by a single NUL byte.
//! There is no length prefix: a receiver scans its byte stream for the
//! delimiter and parses everything before it as one document.
//!
//! ```text
//! ┌──────────────────────────────┬────┬──────────────────────┬────┐
//! │ {"type":"echo","x":1}        │ 00 │ {"type":"tictactoe"… │ 00 │ …
//! └──────────────────────────────┴────┴──────────────────────┴────┘
//! ```
//!
//! # Components
//!
//! - [`frame`]: delimiter constants, frame encoding and decoding
//! - [`message`]: typed client requests and server notifications
//! - [`ProtocolError`]: everything that can go wrong turning bytes into
//!   messages
//!
//! # Limits
//!
//! Inbound frames (delimiter included) are capped at [`MAX_FRAME_SIZE`] and
//! outbound frames at [`MAX_OUTBOUND_SIZE`]. Both limits are enforced and
//! reported as [`ProtocolError::FrameTooLarge`].

#![forbid(unsafe_code)]

pub mod error;
pub mod frame;
pub mod message;

pub use error::{ProtocolError, Result};
pub use frame::{FRAME_DELIMITER, MAX_FRAME_SIZE, MAX_OUTBOUND_SIZE, decode_frame, encode_frame};
pub use message::{ClientMessage, GameRequest, Outcome, PlayerSlot, ServerMessage, SessionKind};
