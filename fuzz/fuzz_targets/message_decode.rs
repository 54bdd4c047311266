//! Fuzz target for frame and request decoding
//!
//! # Invariants
//!
//! - Oversized frames MUST return `ProtocolError::FrameTooLarge`
//! - Anything that decodes either parses into a request or returns a
//!   structured error
//! - NEVER panic on arbitrary bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use turnstile_proto::{ClientMessage, MAX_FRAME_SIZE, ProtocolError, decode_frame};

fuzz_target!(|data: &[u8]| {
    match decode_frame(data) {
        Ok(document) => {
            let _ = ClientMessage::from_value(document);
        },
        Err(ProtocolError::FrameTooLarge { size, max }) => {
            assert_eq!(size, data.len());
            assert_eq!(max, MAX_FRAME_SIZE);
        },
        Err(_) => assert!(data.len() <= MAX_FRAME_SIZE),
    }
});
