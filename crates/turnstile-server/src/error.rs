//! Server error types.

use std::{fmt, io};

use turnstile_core::{ConnectionId, SessionError};
use turnstile_proto::ProtocolError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unparsable bind address, zero limits, etc.).
    ///
    /// Fatal: the server never starts. Fix configuration and restart.
    Config(String),

    /// Listener setup failed.
    ///
    /// `stage` names the step that failed (socket, reuseaddr, bind, listen).
    /// Fatal: the server never starts.
    Setup {
        /// Setup step that failed
        stage: &'static str,
        /// Underlying OS error
        source: io::Error,
    },

    /// Transport/network error on an established connection.
    ///
    /// Only ever fatal for that connection.
    Transport(io::Error),

    /// Message could not be framed.
    ///
    /// Outbound notifications that do not fit the outbound buffer end up here.
    /// The send is dropped, the connection stays up.
    Protocol(ProtocolError),

    /// Session layer refused a request.
    Session(SessionError),

    /// Connection handle no longer resolves.
    ///
    /// Transient: the connection was torn down between lookup and use.
    ConnectionNotFound(ConnectionId),

    /// Internal error (logging setup, impossible state, etc.).
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Setup { stage, source } => write!(f, "listener setup failed at {stage}: {source}"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Session(err) => write!(f, "session error: {err}"),
            Self::ConnectionNotFound(id) => write!(f, "connection not found: {id}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Setup { source, .. } | Self::Transport(source) => Some(source),
            Self::Protocol(err) => Some(err),
            Self::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("tick interval must be non-zero".to_string());
        assert_eq!(err.to_string(), "configuration error: tick interval must be non-zero");

        let err = ServerError::Setup {
            stage: "bind",
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(err.to_string(), "listener setup failed at bind: address in use");
        assert!(err.source().is_some());

        let err: ServerError = ProtocolError::MissingField("type").into();
        assert_eq!(err.to_string(), "protocol error: missing field `type`");
    }
}
