//! Turnstile game server.
//!
//! Completion-driven TCP server wrapping [`turnstile_core`]'s session logic
//! with real sockets on the Tokio runtime.
//!
//! # Architecture
//!
//! Each socket operation (accept, receive, send) is posted as a tracked task
//! carrying a pooled operation record. When the operation finishes, the task
//! hands the record to a single completion routine which updates the
//! connection, posts follow-up work, and recycles the record. Two perpetual
//! loops run beside the operations:
//!
//! - the accept loop keeps a fixed number of accepts posted on the listener
//! - the tick loop feeds buffered frames to the [`SessionManager`] and
//!   executes the actions it returns
//!
//! # Components
//!
//! - [`Server`]: startup, introspection and ordered shutdown
//! - [`Connection`]: per-connection buffers, phase and operation accounting
//! - [`ConnectionRegistry`]: arena of connections plus the registered set
//! - [`console`]: operator commands
//!
//! [`SessionManager`]: turnstile_core::SessionManager

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
pub mod console;
mod dispatcher;
mod error;
mod operation;
mod registry;
pub mod telemetry;
mod transport;

use std::{net::SocketAddr, sync::Arc};

pub use config::{
    DEFAULT_LISTEN_BACKLOG, DEFAULT_MAX_ACCEPTS, DEFAULT_PORT, DEFAULT_TICK_INTERVAL, ServerConfig,
};
pub use connection::{Connection, Phase};
use dispatcher::{ServerContext, accept_loop, tick_loop};
pub use error::ServerError;
pub use operation::{OperationKind, OutboundMessage, PendingOperation};
pub use registry::ConnectionRegistry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
pub use transport::bind_listener;
use turnstile_core::{PoolStats, SessionManager};
use turnstile_proto::ServerMessage;

/// Occupancy of the server's two resource pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    /// Operation records
    pub operations: PoolStats,
    /// Outbound message buffers
    pub outbound: PoolStats,
}

/// Running turnstile server.
///
/// Created by [`Server::bind`], which also starts the accept and tick loops.
/// Dropping a server without calling [`Server::shutdown`] leaves its tasks
/// running until the runtime stops.
pub struct Server {
    ctx: Arc<ServerContext>,
    accept_enabled: CancellationToken,
    tick_enabled: CancellationToken,
    loops: Vec<JoinHandle<()>>,
}

impl Server {
    /// Bind the listener and start serving.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.validate()?;
        let listener = bind_listener(addr, config.listen_backlog)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Setup { stage: "local_addr", source })?;
        let sessions = SessionManager::new()?;

        tracing::info!(
            %local_addr,
            max_accepts = config.max_outstanding_accepts,
            tick = ?config.tick_interval,
            "server listening"
        );

        let ctx = Arc::new(ServerContext::new(config, listener, local_addr, sessions));
        let accept_enabled = CancellationToken::new();
        let tick_enabled = CancellationToken::new();
        let loops = vec![
            tokio::spawn(accept_loop(Arc::clone(&ctx), accept_enabled.clone())),
            tokio::spawn(tick_loop(Arc::clone(&ctx), tick_enabled.clone())),
        ];

        Ok(Self { ctx, accept_enabled, tick_enabled, loops })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.ctx.local_addr()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.ctx.connection_count()
    }

    /// Accepts currently posted on the listener.
    pub fn outstanding_accepts(&self) -> usize {
        self.ctx.outstanding_accepts()
    }

    /// Number of live game sessions.
    pub fn session_count(&self) -> usize {
        self.ctx.session_count()
    }

    /// Pool occupancy.
    pub fn pool_stats(&self) -> PoolReport {
        let (operations, outbound) = self.ctx.pool_stats();
        PoolReport { operations, outbound }
    }

    /// Send `message` to every registered connection.
    pub fn broadcast(&self, message: &ServerMessage) {
        self.ctx.broadcast(message);
    }

    /// Stop the server and release everything it holds.
    ///
    /// Order matters: the loops stop first so nothing new is posted, then the
    /// listener closes, then every connection is torn down and all operation
    /// tasks are awaited, and only then are sessions and pools released.
    pub async fn shutdown(self) {
        tracing::info!("server shutting down");

        self.accept_enabled.cancel();
        self.tick_enabled.cancel();
        for handle in self.loops {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server loop panicked");
            }
        }

        self.ctx.close_listener();
        let closing = self.ctx.close_connections();
        tracing::debug!(closing, "connections closing");

        self.ctx.drain_tasks().await;
        self.ctx.release_all();

        tracing::info!("server stopped");
    }
}
