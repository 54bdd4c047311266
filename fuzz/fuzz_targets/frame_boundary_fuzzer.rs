//! Fuzz target for receive buffer frame extraction
//!
//! Prevent memory exhaustion and lost frames from hostile byte streams
//!
//! # Strategy
//!
//! - Chunks: arbitrary bytes, appended in arbitrary slices
//! - Delimiters: none, sparse, back-to-back
//! - Lengths: empty, tiny, at-limit, far over the limit
//!
//! # Invariants
//!
//! - Undelimited backlog never reaches `MAX_FRAME_SIZE` after extraction
//! - Capacity never shrinks and always covers the buffered bytes
//! - Every extraction makes progress (no infinite loops)
//! - NEVER panic on arbitrary input

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use turnstile_core::RecvBuffer;
use turnstile_proto::MAX_FRAME_SIZE;

#[derive(Debug, Clone, Arbitrary)]
enum Chunk {
    Bytes(Vec<u8>),
    Delimiter,
    Filler { len: u16, byte: u8 },
}

fuzz_target!(|chunks: Vec<Chunk>| {
    let mut buffer = RecvBuffer::default();

    for chunk in chunks {
        let bytes = match chunk {
            Chunk::Bytes(bytes) => bytes,
            Chunk::Delimiter => vec![0],
            Chunk::Filler { len, byte } => vec![byte; usize::from(len % 2048)],
        };

        let capacity = buffer.capacity();
        buffer.append(&bytes);
        assert!(buffer.capacity() >= capacity);
        assert!(buffer.len() <= buffer.capacity());

        let mut guard = 0;
        while buffer.pop_frame().is_some() {
            guard += 1;
            assert!(guard <= bytes.len() + 1, "extraction made no progress");
        }
        assert!(buffer.len() < MAX_FRAME_SIZE);
    }
});
