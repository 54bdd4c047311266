//! Pooled operation records.
//!
//! Every asynchronous socket operation is described by a [`PendingOperation`]
//! taken from a pool when the operation is posted and returned when its
//! completion has been handled. Sends additionally own an [`OutboundMessage`]
//! from a second pool, holding the encoded frame until the write completes.

use std::fmt;

use bytes::BytesMut;
use turnstile_core::{ConnectionId, Recycle};
use turnstile_proto::{MAX_OUTBOUND_SIZE, ProtocolError};

/// Kind of socket operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    /// Waiting for a client on the listener
    #[default]
    Accept,
    /// Reading into the connection's scratch buffer
    Receive,
    /// Writing an outbound message
    Send,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accept => "accept",
            Self::Receive => "receive",
            Self::Send => "send",
        })
    }
}

/// Encoded frame waiting to be written, plus its recipient.
#[derive(Debug)]
pub struct OutboundMessage {
    bytes: BytesMut,
    owner: Option<ConnectionId>,
}

impl Default for OutboundMessage {
    fn default() -> Self {
        Self { bytes: BytesMut::with_capacity(MAX_OUTBOUND_SIZE), owner: None }
    }
}

impl Recycle for OutboundMessage {
    fn recycle(&mut self) {
        self.bytes.clear();
        self.owner = None;
    }
}

impl OutboundMessage {
    /// Copy an encoded frame in and stamp the recipient.
    pub fn fill(&mut self, owner: ConnectionId, frame: &[u8]) -> Result<(), ProtocolError> {
        if frame.len() > MAX_OUTBOUND_SIZE {
            return Err(ProtocolError::FrameTooLarge { size: frame.len(), max: MAX_OUTBOUND_SIZE });
        }
        self.bytes.clear();
        self.bytes.extend_from_slice(frame);
        self.owner = Some(owner);
        Ok(())
    }

    /// Encoded frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Recipient.
    pub fn owner(&self) -> Option<ConnectionId> {
        self.owner
    }
}

/// Record of one posted operation.
#[derive(Debug, Default)]
pub struct PendingOperation {
    kind: OperationKind,
    connection: Option<ConnectionId>,
    message: Option<OutboundMessage>,
}

impl Recycle for PendingOperation {
    fn recycle(&mut self) {
        self.kind = OperationKind::default();
        self.connection = None;
        self.message = None;
    }
}

impl PendingOperation {
    /// Fill in a freshly acquired record.
    pub fn prepare(
        &mut self,
        kind: OperationKind,
        connection: ConnectionId,
        message: Option<OutboundMessage>,
    ) {
        self.kind = kind;
        self.connection = Some(connection);
        self.message = message;
    }

    /// Operation kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Connection the operation belongs to.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Bytes a send should write. Empty for other kinds.
    pub fn payload(&self) -> &[u8] {
        self.message.as_ref().map_or(&[][..], OutboundMessage::as_bytes)
    }

    /// Detach the outbound message so it can go back to its own pool.
    pub fn take_message(&mut self) -> Option<OutboundMessage> {
        self.message.take()
    }
}

#[cfg(test)]
mod tests {
    use turnstile_core::{Arena, Pool, PoolStats};

    use super::*;

    #[test]
    fn outbound_message_rejects_oversized_frames() {
        let mut arena = Arena::new();
        let id = arena.insert(());
        let mut message = OutboundMessage::default();

        let frame = vec![b'x'; MAX_OUTBOUND_SIZE + 1];
        assert!(matches!(message.fill(id, &frame), Err(ProtocolError::FrameTooLarge { .. })));

        message.fill(id, b"{}\0").unwrap();
        assert_eq!(message.as_bytes(), b"{}\0");
        assert_eq!(message.owner(), Some(id));
    }

    #[test]
    fn recycled_operation_is_blank() {
        let mut arena = Arena::new();
        let id = arena.insert(());
        let pool: Pool<PendingOperation> = Pool::new("operations");

        let mut op = pool.acquire();
        let mut message = OutboundMessage::default();
        message.fill(id, b"1\0").unwrap();
        op.prepare(OperationKind::Send, id, Some(message));
        assert_eq!(op.payload(), b"1\0");
        pool.release(op);

        let op = pool.acquire();
        assert_eq!(op.kind(), OperationKind::Accept);
        assert_eq!(op.connection(), None);
        assert!(op.payload().is_empty());
        assert_eq!(pool.stats(), PoolStats { idle: 0, in_use: 1 });
    }

    #[test]
    fn recycled_message_keeps_capacity() {
        let pool: Pool<OutboundMessage> = Pool::new("outbound");
        let message = pool.acquire();
        pool.release(message);

        let message = pool.acquire();
        assert!(message.as_bytes().is_empty());
        assert!(message.bytes.capacity() >= MAX_OUTBOUND_SIZE);
    }
}
