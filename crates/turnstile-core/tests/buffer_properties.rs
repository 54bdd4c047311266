//! Property-based tests for RecvBuffer
//!
//! However the byte stream is chopped up by the network, the frames that come
//! out must be the frames that went in.

use proptest::prelude::*;
use serde_json::{Value, json};
use turnstile_core::RecvBuffer;
use turnstile_proto::{MAX_FRAME_SIZE, encode_frame};

fn document() -> impl Strategy<Value = Value> {
    ("[a-z]{0,12}", any::<i32>(), any::<bool>())
        .prop_map(|(text, n, flag)| json!({"type": "echo", "text": text, "n": n, "flag": flag}))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: arbitrary chunking preserves frame boundaries and order
    #[test]
    fn prop_chunking_preserves_frames(
        documents in prop::collection::vec(document(), 1..16),
        cuts in prop::collection::vec(1usize..40, 1..64),
    ) {
        let mut stream = Vec::new();
        for document in &documents {
            stream.extend(encode_frame(document)?);
        }

        let mut buffer = RecvBuffer::default();
        let mut decoded = Vec::new();
        let mut rest = stream.as_slice();
        let mut cuts = cuts.into_iter().cycle();

        while !rest.is_empty() {
            let take = cuts.next().unwrap_or(1).min(rest.len());
            let (chunk, tail) = rest.split_at(take);
            buffer.append(chunk);
            rest = tail;

            while let Some(frame) = buffer.pop_frame() {
                decoded.push(frame?);
            }
        }

        prop_assert_eq!(decoded, documents);
        prop_assert!(buffer.is_empty());
    }

    /// Property: an append that overflows free space at least doubles capacity
    #[test]
    fn prop_growth_at_least_doubles(
        initial in 1usize..64,
        appends in prop::collection::vec(1usize..200, 1..32),
    ) {
        let mut buffer = RecvBuffer::with_capacity(initial);

        for n in appends {
            let before = buffer.capacity();
            let overflows = buffer.free() < n;
            buffer.append(&vec![b' '; n]);

            if overflows {
                prop_assert!(buffer.capacity() >= before * 2);
                prop_assert!(buffer.capacity() >= before + 2 * n);
            } else {
                prop_assert_eq!(buffer.capacity(), before);
            }
            prop_assert!(buffer.len() <= buffer.capacity());
        }
    }

    /// Property: garbage without delimiters never accumulates past the limit
    #[test]
    fn prop_undelimited_bytes_stay_bounded(
        chunks in prop::collection::vec(prop::collection::vec(1u8..=255, 1..100), 1..32),
    ) {
        let mut buffer = RecvBuffer::default();
        for chunk in chunks {
            buffer.append(&chunk);
            while buffer.pop_frame().is_some() {}
            prop_assert!(buffer.len() < MAX_FRAME_SIZE);
        }
    }
}
