//! Error types for the session layer.
//!
//! [`FsmError`] covers misuse of the state machine engine. [`SessionError`]
//! covers requests a session or the manager refuses. Neither is fatal for the
//! server: the caller logs and moves on.

use thiserror::Error;
use turnstile_proto::{ProtocolError, SessionKind};

use crate::{ConnectionId, session::SessionId};

/// Errors raised by [`StateMachine`](crate::StateMachine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsmError {
    /// `update` or `state` called before the first `set_state`.
    #[error("state machine has not been started")]
    NotStarted,

    /// Transition target was never registered.
    #[error("state {0} is not registered")]
    UnregisteredState(String),

    /// Enter callbacks kept requesting transitions past the hop limit.
    #[error("transition chain exceeded {limit} hops")]
    TransitionLoop {
        /// Hop limit that was hit
        limit: usize,
    },
}

/// Requests refused by a session or the session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Frame did not decode into a known request.
    #[error("rejected frame: {0}")]
    Rejected(#[from] ProtocolError),

    /// `service_create` named a session type nobody provides.
    #[error("unknown session type: {0}")]
    UnknownSessionType(String),

    /// Connection already holds a seat.
    #[error("connection {connection} is already seated in {session}")]
    AlreadySeated {
        /// Connection asking for a second seat
        connection: ConnectionId,
        /// Session it already occupies
        session: SessionId,
    },

    /// No seat left in the session.
    #[error("{kind} session {session} is full")]
    SessionFull {
        /// Session that refused the join
        session: SessionId,
        /// Kind of the session
        kind: SessionKind,
    },

    /// State machine misuse inside a session.
    #[error("state machine error: {0}")]
    Fsm(#[from] FsmError),
}
