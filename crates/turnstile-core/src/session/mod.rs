//! Session contract and the actions sessions emit.
//!
//! A session consumes client input through [`Session::accept`], advances on
//! [`Session::tick`], and reports everything it wants done as
//! [`SessionAction`]s. Input is queued, never processed inline, so all state
//! changes happen on the tick and in arrival order.

pub mod board;
pub mod echo;
pub mod tictactoe;

use std::fmt;

use turnstile_proto::ServerMessage;

use crate::{ConnectionId, error::SessionError};

/// Identity of a session, unique for the lifetime of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Work a session asks the I/O layer to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Post a send of `message` to one connection. A connection that is gone
    /// by the time the action runs is skipped.
    Send {
        /// Recipient
        to: ConnectionId,
        /// Notification to encode and send
        message: ServerMessage,
    },
}

impl SessionAction {
    /// Recipient of this action.
    pub fn recipient(&self) -> ConnectionId {
        match self {
            Self::Send { to, .. } => *to,
        }
    }
}

/// Behaviour shared by every session protocol.
pub trait Session {
    /// Client input this session understands.
    type Input;

    /// Session identity.
    fn id(&self) -> SessionId;

    /// Queue `input` from `from`. Input from connections the session does not
    /// serve is ignored.
    fn accept(&mut self, from: ConnectionId, input: Self::Input);

    /// Process queued input and react to connections that went away.
    ///
    /// `is_live` answers whether a connection is still registered with the
    /// server.
    fn tick(
        &mut self,
        is_live: &dyn Fn(ConnectionId) -> bool,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), SessionError>;

    /// Forget a connection that has been torn down.
    fn remove_connection(&mut self, connection: ConnectionId);

    /// Whether the manager may drop this session.
    fn is_disposable(&self) -> bool;

    /// Stop the session, running the current state's leave hook.
    fn shutdown(&mut self);
}
