//! TCP listener setup.
//!
//! The listening socket is built step by step so each failure can be
//! reported with the step that caused it:
//!
//! 1. create the socket for the address family
//! 2. enable address reuse
//! 3. bind
//! 4. listen with the configured backlog
//!
//! Accepted sockets come straight out of the listener. There is no
//! conditional-accept hook on this platform layer: every connection the
//! kernel completes is handed to the server.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

use crate::error::ServerError;

/// Create a listening socket on `addr`.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ServerError> {
    let socket = if addr.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() }
        .map_err(|source| ServerError::Setup { stage: "socket", source })?;

    socket
        .set_reuseaddr(true)
        .map_err(|source| ServerError::Setup { stage: "reuseaddr", source })?;
    socket.bind(addr).map_err(|source| ServerError::Setup { stage: "bind", source })?;

    let listener =
        socket.listen(backlog).map_err(|source| ServerError::Setup { stage: "listen", source })?;

    tracing::debug!(%addr, backlog, "listener ready");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn reports_failing_stage() {
        let first = bind_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let taken = first.local_addr().unwrap();

        // SO_REUSEADDR does not allow two listeners on one port
        let err = bind_listener(taken, 16).unwrap_err();
        assert!(matches!(err, ServerError::Setup { stage: "bind" | "listen", .. }), "{err}");
    }
}
