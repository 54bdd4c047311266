//! Per-connection receive buffer.
//!
//! Bytes from each completed receive are appended here; the tick loop pulls
//! whole frames back out. The buffer tracks a logical capacity that grows
//! geometrically: when an append would not fit, capacity becomes at least
//! `max(2 * capacity, capacity + 2 * n)`. Nothing ever shrinks it.
//!
//! Frame extraction enforces [`MAX_FRAME_SIZE`] on both complete and partial
//! frames. A peer that streams bytes without a delimiter gets its backlog
//! discarded once it can no longer form a legal frame, so one connection can
//! never pin unbounded memory.

use std::collections::VecDeque;

use serde_json::Value;
use turnstile_proto::{FRAME_DELIMITER, MAX_FRAME_SIZE, ProtocolError, decode_frame};

/// Growable byte ring buffer with NUL-delimited frame extraction.
#[derive(Debug)]
pub struct RecvBuffer {
    bytes: VecDeque<u8>,
    capacity: usize,
}

impl Default for RecvBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_FRAME_SIZE)
    }
}

impl RecvBuffer {
    /// Create an empty buffer with `capacity` bytes of room.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { bytes: VecDeque::with_capacity(capacity), capacity }
    }

    /// Logical capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffered byte count.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Room left before the next append has to grow.
    pub fn free(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    /// Append received bytes, growing capacity if they do not fit.
    pub fn append(&mut self, data: &[u8]) {
        if self.free() < data.len() {
            let grown = (self.capacity * 2).max(self.capacity + 2 * data.len());
            tracing::trace!(from = self.capacity, to = grown, "receive buffer grown");
            self.bytes.reserve(grown - self.bytes.len());
            self.capacity = grown;
        }
        self.bytes.extend(data);
    }

    /// Remove the oldest complete frame and decode it.
    ///
    /// Returns `None` when no complete frame is buffered yet. Oversized and
    /// malformed frames are consumed and reported as errors, so repeated
    /// calls always make progress.
    pub fn pop_frame(&mut self) -> Option<Result<Value, ProtocolError>> {
        match self.bytes.iter().position(|&b| b == FRAME_DELIMITER) {
            Some(end) => {
                let frame: Vec<u8> = self.bytes.drain(..=end).collect();
                Some(decode_frame(&frame))
            },
            // A delimiter arriving now would make the frame MAX + 1 bytes
            None if self.bytes.len() >= MAX_FRAME_SIZE => {
                let size = self.bytes.len();
                self.bytes.clear();
                Some(Err(ProtocolError::FrameTooLarge { size, max: MAX_FRAME_SIZE }))
            },
            None => None,
        }
    }

    /// Drop all buffered bytes. Capacity is kept.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
