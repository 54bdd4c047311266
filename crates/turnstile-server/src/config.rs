//! Server configuration.

use std::{net::SocketAddr, time::Duration};

use crate::error::ServerError;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 17000;

/// Default number of accepts kept posted on the listener.
pub const DEFAULT_MAX_ACCEPTS: usize = 100;

/// Default session tick period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Default kernel accept backlog.
pub const DEFAULT_LISTEN_BACKLOG: u32 = 1024;

/// Server runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:17000")
    pub bind_address: String,
    /// Accepts kept outstanding on the listener at all times
    pub max_outstanding_accepts: usize,
    /// Period of the session tick loop
    pub tick_interval: Duration,
    /// Backlog passed to `listen(2)`
    pub listen_backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_outstanding_accepts: DEFAULT_MAX_ACCEPTS,
            tick_interval: DEFAULT_TICK_INTERVAL,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
        }
    }
}

impl ServerConfig {
    /// Check limits and resolve the bind address.
    pub fn validate(&self) -> Result<SocketAddr, ServerError> {
        if self.max_outstanding_accepts == 0 {
            return Err(ServerError::Config("max outstanding accepts must be at least 1".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(ServerError::Config("tick interval must be non-zero".into()));
        }
        if self.listen_backlog == 0 {
            return Err(ServerError::Config("listen backlog must be at least 1".into()));
        }
        self.bind_address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address {:?}: {e}", self.bind_address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        let addr = config.validate().unwrap();
        assert_eq!(addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_outstanding_accepts, 100);
    }

    #[test]
    fn rejects_bad_values() {
        let config = ServerConfig { bind_address: "nowhere".into(), ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        let config = ServerConfig { max_outstanding_accepts: 0, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        let config = ServerConfig { tick_interval: Duration::ZERO, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        let config = ServerConfig { listen_backlog: 0, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }
}
