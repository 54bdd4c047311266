//! Turnstile core logic.
//!
//! Everything here is pure: no sockets, no runtime, no clocks. The I/O
//! engine in `turnstile-server` feeds decoded frames and liveness
//! information in, and executes the [`SessionAction`]s that come back out.
//!
//! # Components
//!
//! - [`Arena`] / [`Handle`]: generation-checked slot storage. Connections are
//!   owned by an arena and referenced everywhere else by [`ConnectionId`].
//! - [`Pool`]: recycling allocator for per-operation resources
//! - [`RecvBuffer`]: growable receive ring buffer with frame extraction
//! - [`StateMachine`]: named-state enter/update/leave engine
//! - [`EchoSession`], [`GameSession`]: the two session protocols
//! - [`SessionManager`]: matchmaking, routing and housekeeping

#![forbid(unsafe_code)]

pub mod arena;
pub mod buffer;
pub mod error;
pub mod fsm;
pub mod manager;
pub mod pool;
pub mod session;
pub mod sync;

pub use arena::{Arena, Handle};
pub use buffer::RecvBuffer;
pub use error::{FsmError, SessionError};
pub use fsm::{StateMachine, States};
pub use manager::SessionManager;
pub use pool::{Pool, PoolStats, Recycle};
pub use session::{
    Session, SessionAction, SessionId,
    board::{BOARD_SIZE, Board, MoveError, Symbol, Verdict},
    echo::EchoSession,
    tictactoe::{GameSession, GameState},
};

/// Identity of a connection: a handle into the server's connection arena.
pub type ConnectionId = Handle;
