//! Per-connection state.
//!
//! A [`Connection`] is created before its socket exists: the accept loop
//! reserves one per posted accept, and the stream is attached once that
//! accept completes. Its phase only moves forward:
//!
//! ```text
//! Waiting ──accept──▶ Accepted ──close──▶ Disconnected
//!    └──────────────failed accept────────────▲
//! ```
//!
//! Every posted operation is counted in `in_flight`. Teardown cancels the
//! connection's token and then waits for that count to drain before the
//! connection leaves the arena, so no completion ever observes a freed
//! connection.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering},
    },
};

use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::{Notify, watch},
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use turnstile_core::{ConnectionId, RecvBuffer, sync::lock};
use turnstile_proto::{MAX_FRAME_SIZE, ProtocolError};

use crate::error::ServerError;

/// Lifecycle phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    /// Reserved for a posted accept; no socket yet
    Waiting = 0,
    /// Socket attached and registered
    Accepted = 1,
    /// Closed or closing; no new operations are posted
    Disconnected = 2,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Waiting,
            1 => Self::Accepted,
            _ => Self::Disconnected,
        }
    }
}

/// A client connection and the state its operations share.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    phase: AtomicU8,
    stream: OnceLock<TcpStream>,
    peer: OnceLock<SocketAddr>,
    scratch: Mutex<[u8; MAX_FRAME_SIZE]>,
    recv: Mutex<RecvBuffer>,
    receive_posted: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
    next_ticket: AtomicU64,
    send_turn: watch::Sender<u64>,
    cancel: CancellationToken,
}

impl Connection {
    /// Create a connection in [`Phase::Waiting`].
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: AtomicU8::new(Phase::Waiting as u8),
            stream: OnceLock::new(),
            peer: OnceLock::new(),
            scratch: Mutex::new([0; MAX_FRAME_SIZE]),
            recv: Mutex::new(RecvBuffer::default()),
            receive_posted: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
            next_ticket: AtomicU64::new(0),
            send_turn: watch::channel(0).0,
            cancel: CancellationToken::new(),
        }
    }

    /// Arena handle of this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Move to `to` if that is forward. Returns whether the phase changed.
    pub fn advance(&self, to: Phase) -> bool {
        self.phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (to as u8 > current).then_some(to as u8)
            })
            .is_ok()
    }

    /// Remote address, once accepted.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer.get().copied()
    }

    /// Attach the accepted socket.
    pub fn attach(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), ServerError> {
        self.stream
            .set(stream)
            .map_err(|_| ServerError::Internal(format!("connection {} already has a socket", self.id)))?;
        let _ = self.peer.set(peer);
        Ok(())
    }

    fn stream(&self) -> io::Result<&TcpStream> {
        self.stream.get().ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }

    /// Count a newly posted operation.
    pub fn begin_operation(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Count a finished operation, waking teardown on the last one.
    pub fn end_operation(&self) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        if previous <= 1 {
            self.drained.notify_waiters();
        }
    }

    /// Operations posted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no operation is in flight.
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Claim the single receive slot. Fails if a receive is already posted.
    pub fn try_begin_receive(&self) -> bool {
        self.receive_posted.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Free the receive slot after a receive completed.
    pub fn finish_receive(&self) {
        self.receive_posted.store(false, Ordering::Release);
    }

    /// Wait for readable data and read it into the scratch buffer.
    pub async fn receive(&self) -> io::Result<usize> {
        let stream = self.stream()?;
        loop {
            stream.readable().await?;
            match self.read_scratch(stream) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {},
                result => return result,
            }
        }
    }

    fn read_scratch(&self, stream: &TcpStream) -> io::Result<usize> {
        stream.try_read(&mut lock(&self.scratch)[..])
    }

    /// Move `n` bytes from the scratch buffer into the receive buffer.
    pub fn consume_scratch(&self, n: usize) {
        let scratch = lock(&self.scratch);
        lock(&self.recv).append(&scratch[..n.min(MAX_FRAME_SIZE)]);
    }

    /// Take the oldest complete frame out of the receive buffer.
    pub fn pop_frame(&self) -> Option<Result<Value, ProtocolError>> {
        lock(&self.recv).pop_frame()
    }

    /// Reserve this send's place in the outbound byte order.
    pub fn take_send_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::AcqRel)
    }

    /// Write `bytes` once every earlier ticket has been written.
    ///
    /// Sends run concurrently but reach the socket in ticket order, so one
    /// message never interleaves with another.
    pub async fn send(&self, ticket: u64, bytes: &[u8]) -> io::Result<usize> {
        let mut turn = self.send_turn.subscribe();
        turn.wait_for(|&current| current == ticket)
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        let _turn = SendTurn(self);

        let stream = self.stream()?;
        let mut written = 0;
        while written < bytes.len() {
            stream.writable().await?;
            match stream.try_write(&bytes[written..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {},
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Cancel every operation of this connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the connection is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

/// Passes the send turn on when dropped, including on cancellation.
struct SendTurn<'a>(&'a Connection);

impl Drop for SendTurn<'_> {
    fn drop(&mut self) {
        self.0.send_turn.send_modify(|turn| *turn += 1);
    }
}

#[cfg(test)]
mod tests {
    use turnstile_core::Arena;

    use super::*;

    fn connection() -> Connection {
        let mut arena = Arena::new();
        Connection::new(arena.insert(()))
    }

    #[test]
    fn phase_only_moves_forward() {
        let conn = connection();
        assert_eq!(conn.phase(), Phase::Waiting);

        assert!(conn.advance(Phase::Accepted));
        assert!(!conn.advance(Phase::Accepted));
        assert!(conn.advance(Phase::Disconnected));
        assert!(!conn.advance(Phase::Accepted));
        assert_eq!(conn.phase(), Phase::Disconnected);
    }

    #[test]
    fn waiting_can_disconnect_directly() {
        let conn = connection();
        assert!(conn.advance(Phase::Disconnected));
        assert_eq!(conn.phase(), Phase::Disconnected);
    }

    #[test]
    fn single_receive_slot() {
        let conn = connection();
        assert!(conn.try_begin_receive());
        assert!(!conn.try_begin_receive());
        conn.finish_receive();
        assert!(conn.try_begin_receive());
    }

    #[test]
    fn tickets_are_sequential() {
        let conn = connection();
        assert_eq!(conn.take_send_ticket(), 0);
        assert_eq!(conn.take_send_ticket(), 1);
    }

    #[tokio::test]
    async fn drained_waits_for_operations() {
        let conn = std::sync::Arc::new(connection());
        conn.begin_operation();
        conn.begin_operation();

        let waiter = tokio::spawn({
            let conn = conn.clone();
            async move { conn.drained().await }
        });

        conn.end_operation();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        conn.end_operation();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(conn.in_flight(), 0);
    }

    #[tokio::test]
    async fn receive_without_socket_fails() {
        let conn = connection();
        let err = conn.receive().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
