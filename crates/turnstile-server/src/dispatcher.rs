//! Completion dispatcher.
//!
//! Every socket operation runs as a tracked task that ends by handing its
//! [`PendingOperation`] and result to [`ServerContext::complete`]. That one
//! routine decides what happens next:
//!
//! | completion            | reaction                                   |
//! |-----------------------|--------------------------------------------|
//! | any failure           | close the connection                       |
//! | accept                | attach socket, register, post first receive|
//! | receive of 0 bytes    | peer closed: close the connection          |
//! | receive of n bytes    | buffer the bytes, post the next receive    |
//! | send                  | return the outbound buffer to its pool     |
//!
//! The operation record itself always goes back to its pool afterwards and
//! the connection's in-flight count drops by one.
//!
//! Closing never frees anything inline. It marks the connection
//! disconnected, cancels its outstanding operations and spawns a teardown
//! task that waits for them to drain before the connection leaves the
//! registry and the sessions.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    net::{TcpListener, TcpStream},
    sync::Notify,
    time::MissedTickBehavior,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use turnstile_core::{
    ConnectionId, Pool, PoolStats, SessionAction, SessionManager, sync::lock,
};
use turnstile_proto::ServerMessage;

use crate::{
    config::ServerConfig,
    connection::{Connection, Phase},
    error::ServerError,
    operation::{OperationKind, OutboundMessage, PendingOperation},
    registry::ConnectionRegistry,
};

/// Pause before re-posting accepts after one failed.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Successful outcome of an operation.
#[derive(Debug)]
pub(crate) enum Completion {
    /// Accept finished with a new socket
    Accepted {
        /// Accepted socket
        stream: TcpStream,
        /// Remote address
        peer: SocketAddr,
    },
    /// Receive or send moved this many bytes
    Transferred(usize),
}

fn aborted() -> io::Error {
    io::Error::from(io::ErrorKind::ConnectionAborted)
}

/// State shared by the loops and every operation task.
pub(crate) struct ServerContext {
    config: ServerConfig,
    local_addr: SocketAddr,
    listener: Mutex<Option<Arc<TcpListener>>>,
    listener_cancel: CancellationToken,
    registry: Mutex<ConnectionRegistry>,
    sessions: Mutex<SessionManager>,
    operations: Pool<PendingOperation>,
    outbound: Pool<OutboundMessage>,
    outstanding_accepts: AtomicUsize,
    accept_slot_freed: Notify,
    accept_backoff: AtomicBool,
    tasks: TaskTracker,
}

impl ServerContext {
    pub(crate) fn new(
        config: ServerConfig,
        listener: TcpListener,
        local_addr: SocketAddr,
        sessions: SessionManager,
    ) -> Self {
        Self {
            config,
            local_addr,
            listener: Mutex::new(Some(Arc::new(listener))),
            listener_cancel: CancellationToken::new(),
            registry: Mutex::new(ConnectionRegistry::new()),
            sessions: Mutex::new(sessions),
            operations: Pool::new("operations"),
            outbound: Pool::new("outbound"),
            outstanding_accepts: AtomicUsize::new(0),
            accept_slot_freed: Notify::new(),
            accept_backoff: AtomicBool::new(false),
            tasks: TaskTracker::new(),
        }
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn connection_count(&self) -> usize {
        lock(&self.registry).size()
    }

    pub(crate) fn outstanding_accepts(&self) -> usize {
        self.outstanding_accepts.load(Ordering::Acquire)
    }

    pub(crate) fn session_count(&self) -> usize {
        lock(&self.sessions).session_count()
    }

    pub(crate) fn pool_stats(&self) -> (PoolStats, PoolStats) {
        (self.operations.stats(), self.outbound.stats())
    }

    /// Top the listener back up to `max_outstanding_accepts` posted accepts.
    pub(crate) fn post_accept(self: &Arc<Self>) -> usize {
        let Some(listener) = lock(&self.listener).clone() else {
            return 0;
        };
        if self.listener_cancel.is_cancelled() {
            return 0;
        }

        let gap = self.config.max_outstanding_accepts.saturating_sub(self.outstanding_accepts());
        for _ in 0..gap {
            let conn = lock(&self.registry).create();
            let mut op = self.operations.acquire();
            op.prepare(OperationKind::Accept, conn.id(), None);
            conn.begin_operation();
            self.outstanding_accepts.fetch_add(1, Ordering::AcqRel);

            let ctx = Arc::clone(self);
            let listener = Arc::clone(&listener);
            self.tasks.spawn(async move {
                let result = tokio::select! {
                    () = ctx.listener_cancel.cancelled() => Err(aborted()),
                    accepted = listener.accept() => {
                        accepted.map(|(stream, peer)| Completion::Accepted { stream, peer })
                    },
                };
                drop(listener);
                ctx.complete(op, conn, result);
            });
        }

        if gap > 0 {
            tracing::debug!(posted = gap, outstanding = self.outstanding_accepts(), "accepts posted");
        }
        gap
    }

    fn post_receive(self: &Arc<Self>, conn: &Arc<Connection>) {
        if conn.phase() != Phase::Accepted {
            return;
        }
        if !conn.try_begin_receive() {
            tracing::error!(connection = %conn.id(), "receive already posted");
            return;
        }

        let mut op = self.operations.acquire();
        op.prepare(OperationKind::Receive, conn.id(), None);
        conn.begin_operation();

        let ctx = Arc::clone(self);
        let conn = Arc::clone(conn);
        self.tasks.spawn(async move {
            let result = tokio::select! {
                () = conn.cancelled() => Err(aborted()),
                read = conn.receive() => read.map(Completion::Transferred),
            };
            ctx.complete(op, conn, result);
        });
    }

    /// Encode `message` and post a send of it to `to`.
    ///
    /// Connections that are gone or not yet accepted are skipped silently.
    pub(crate) fn post_send(
        self: &Arc<Self>,
        to: ConnectionId,
        message: &ServerMessage,
    ) -> Result<(), ServerError> {
        let frame = message.encode()?;

        let Some(conn) = lock(&self.registry).get(to) else {
            tracing::trace!(connection = %to, "send to departed connection skipped");
            return Ok(());
        };
        if conn.phase() != Phase::Accepted {
            return Ok(());
        }

        let mut outbound = self.outbound.acquire();
        if let Err(e) = outbound.fill(to, &frame) {
            self.outbound.release(outbound);
            return Err(e.into());
        }

        let mut op = self.operations.acquire();
        op.prepare(OperationKind::Send, to, Some(outbound));
        let ticket = conn.take_send_ticket();
        conn.begin_operation();

        let ctx = Arc::clone(self);
        self.tasks.spawn(async move {
            let result = tokio::select! {
                () = conn.cancelled() => Err(aborted()),
                sent = conn.send(ticket, op.payload()) => sent.map(Completion::Transferred),
            };
            ctx.complete(op, conn, result);
        });
        Ok(())
    }

    /// Send `message` to every registered connection.
    pub(crate) fn broadcast(self: &Arc<Self>, message: &ServerMessage) {
        let targets: Vec<ConnectionId> = lock(&self.registry).registered().map(|c| c.id()).collect();
        for to in targets {
            if let Err(e) = self.post_send(to, message) {
                tracing::warn!(connection = %to, error = %e, "broadcast send failed");
            }
        }
    }

    /// Route a finished operation.
    fn complete(
        self: &Arc<Self>,
        mut op: PendingOperation,
        conn: Arc<Connection>,
        result: io::Result<Completion>,
    ) {
        let kind = op.kind();
        match kind {
            OperationKind::Accept => {
                let _ = self.outstanding_accepts.fetch_update(
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    |n| Some(n.saturating_sub(1)),
                );
                self.accept_slot_freed.notify_one();
            },
            OperationKind::Receive => conn.finish_receive(),
            OperationKind::Send => {},
        }

        match (kind, result) {
            (_, Err(e)) => {
                if e.kind() == io::ErrorKind::ConnectionAborted {
                    tracing::trace!(connection = %conn.id(), %kind, "operation cancelled");
                } else {
                    tracing::debug!(connection = %conn.id(), %kind, error = %e, "operation failed");
                    if kind == OperationKind::Accept {
                        self.accept_backoff.store(true, Ordering::Release);
                    }
                }
                self.on_close(&mut op, &conn);
            },
            (OperationKind::Accept, Ok(Completion::Accepted { stream, peer })) => {
                self.on_accept(&conn, stream, peer);
            },
            (OperationKind::Receive, Ok(Completion::Transferred(0))) => {
                tracing::debug!(connection = %conn.id(), "peer closed connection");
                self.on_close(&mut op, &conn);
            },
            (OperationKind::Receive, Ok(Completion::Transferred(n))) => self.on_recv(&conn, n),
            (OperationKind::Send, Ok(Completion::Transferred(n))) => self.on_send(&mut op, n),
            (kind, Ok(_)) => {
                tracing::error!(connection = %conn.id(), %kind, "completion does not match operation");
                self.on_close(&mut op, &conn);
            },
        }

        self.release(op, &conn);
    }

    fn on_accept(self: &Arc<Self>, conn: &Arc<Connection>, stream: TcpStream, peer: SocketAddr) {
        let ctx = Arc::clone(self);
        let conn = Arc::clone(conn);
        self.tasks.spawn(async move { ctx.register(&conn, stream, peer) });
    }

    fn register(self: &Arc<Self>, conn: &Arc<Connection>, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(connection = %conn.id(), error = %e, "failed to disable nagle");
        }
        if let Err(e) = conn.attach(stream, peer) {
            tracing::error!(connection = %conn.id(), error = %e, "attach failed");
            self.request_remove(conn);
            return;
        }
        if !conn.advance(Phase::Accepted) {
            self.request_remove(conn);
            return;
        }

        let (registered, connections) = {
            let mut registry = lock(&self.registry);
            (registry.add(conn.id()), registry.size())
        };
        if !registered {
            self.request_remove(conn);
            return;
        }

        tracing::info!(connection = %conn.id(), %peer, connections, "client connected");
        self.post_receive(conn);
    }

    fn on_recv(self: &Arc<Self>, conn: &Arc<Connection>, n: usize) {
        tracing::trace!(connection = %conn.id(), bytes = n, "received");
        conn.consume_scratch(n);
        self.post_receive(conn);
    }

    fn on_send(&self, op: &mut PendingOperation, n: usize) {
        tracing::trace!(connection = ?op.connection(), bytes = n, "sent");
        if let Some(message) = op.take_message() {
            self.outbound.release(message);
        }
    }

    fn on_close(self: &Arc<Self>, op: &mut PendingOperation, conn: &Arc<Connection>) {
        if let Some(message) = op.take_message() {
            self.outbound.release(message);
        }
        self.request_remove(conn);
    }

    fn release(&self, mut op: PendingOperation, conn: &Connection) {
        if let Some(message) = op.take_message() {
            self.outbound.release(message);
        }
        self.operations.release(op);
        conn.end_operation();
    }

    /// Schedule teardown of `conn`. Only the first request has any effect.
    pub(crate) fn request_remove(self: &Arc<Self>, conn: &Arc<Connection>) {
        if !conn.advance(Phase::Disconnected) {
            return;
        }
        conn.cancel();

        let ctx = Arc::clone(self);
        let conn = Arc::clone(conn);
        self.tasks.spawn(async move { ctx.teardown(conn).await });
    }

    async fn teardown(self: Arc<Self>, conn: Arc<Connection>) {
        conn.drained().await;

        let remaining = {
            let mut registry = lock(&self.registry);
            registry.remove(conn.id());
            registry.size()
        };
        lock(&self.sessions).remove_connection(conn.id());

        match conn.peer_addr() {
            Some(peer) => {
                tracing::info!(connection = %conn.id(), %peer, remaining, "client disconnected");
            },
            None => tracing::trace!(connection = %conn.id(), "unused accept slot released"),
        }
    }

    /// Feed buffered frames to the sessions, tick them, and execute the
    /// resulting actions.
    pub(crate) fn update_sessions(self: &Arc<Self>) {
        let actions = {
            let mut sessions = lock(&self.sessions);
            let registry = lock(&self.registry);
            let mut actions = Vec::new();

            for conn in registry.registered() {
                while let Some(frame) = conn.pop_frame() {
                    let document = match frame {
                        Ok(document) => document,
                        Err(e) => {
                            tracing::warn!(connection = %conn.id(), error = %e, "dropping frame");
                            continue;
                        },
                    };
                    match sessions.handle_frame(conn.id(), document) {
                        Ok(mut produced) => actions.append(&mut produced),
                        Err(e) => {
                            tracing::warn!(connection = %conn.id(), error = %e, "request rejected");
                        },
                    }
                }
            }

            actions.extend(sessions.tick(|id| registry.is_registered(id)));
            actions
        };

        for action in actions {
            self.execute(action);
        }
    }

    fn execute(self: &Arc<Self>, action: SessionAction) {
        match action {
            SessionAction::Send { to, message } => {
                if let Err(e) = self.post_send(to, &message) {
                    tracing::warn!(connection = %to, error = %e, "send failed");
                }
            },
        }
    }

    /// Stop accepting: cancel posted accepts and close the listening socket.
    pub(crate) fn close_listener(&self) {
        self.listener_cancel.cancel();
        lock(&self.listener).take();
    }

    /// Request teardown of every connection, accepted or waiting.
    pub(crate) fn close_connections(self: &Arc<Self>) -> usize {
        let all = lock(&self.registry).all();
        for conn in &all {
            self.request_remove(conn);
        }
        all.len()
    }

    /// Wait for every operation and teardown task to finish.
    pub(crate) async fn drain_tasks(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Drop whatever is left in the registry, stop the sessions and release
    /// pooled resources.
    pub(crate) fn release_all(&self) {
        let leftover = lock(&self.registry).drain();
        if !leftover.is_empty() {
            tracing::warn!(count = leftover.len(), "connections outlived teardown");
        }
        lock(&self.sessions).shutdown();

        let operations = self.operations.clear();
        let outbound = self.outbound.clear();
        tracing::info!(%operations, %outbound, "pools released");
    }
}

/// Keep the listener topped up with posted accepts until `enabled` is
/// cancelled.
pub(crate) async fn accept_loop(ctx: Arc<ServerContext>, enabled: CancellationToken) {
    loop {
        if ctx.accept_backoff.swap(false, Ordering::AcqRel) {
            tokio::select! {
                () = enabled.cancelled() => break,
                () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {},
            }
        }

        ctx.post_accept();

        tokio::select! {
            () = enabled.cancelled() => break,
            () = ctx.accept_slot_freed.notified() => {},
        }
    }
    tracing::debug!("accept loop stopped");
}

/// Drive the sessions every `tick_interval` until `enabled` is cancelled.
pub(crate) async fn tick_loop(ctx: Arc<ServerContext>, enabled: CancellationToken) {
    let mut interval = tokio::time::interval(ctx.config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = enabled.cancelled() => break,
            _ = interval.tick() => ctx.update_sessions(),
        }
    }
    tracing::debug!("tick loop stopped");
}
