//! Turnstile server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on port 17000 with 100 outstanding accepts
//! turnstile-server 17000 100
//!
//! # Loopback only, verbose
//! turnstile-server 17000 100 --host 127.0.0.1 --log-level debug
//! ```
//!
//! Type `shutdown` (or send Ctrl-C) to stop.

use std::time::Duration;

use clap::Parser;
use tokio::io::{BufReader, stdin, stdout};
use turnstile_server::{
    DEFAULT_LISTEN_BACKLOG, DEFAULT_MAX_ACCEPTS, DEFAULT_PORT, Server, ServerConfig, console,
    telemetry,
};

/// Turnstile game server
#[derive(Parser, Debug)]
#[command(name = "turnstile-server")]
#[command(about = "Completion-driven TCP server for echo and tic-tac-toe sessions")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Accepts kept outstanding on the listener
    #[arg(default_value_t = DEFAULT_MAX_ACCEPTS)]
    max_accepts: usize,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Session tick period in milliseconds
    #[arg(long, default_value = "10")]
    tick_ms: u64,

    /// Kernel accept backlog
    #[arg(long, default_value_t = DEFAULT_LISTEN_BACKLOG)]
    backlog: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let trace = telemetry::init(&args.log_level)?;

    tracing::info!("Turnstile server starting");

    let host = if args.host.contains(':') { format!("[{}]", args.host) } else { args.host };
    let config = ServerConfig {
        bind_address: format!("{host}:{}", args.port),
        max_outstanding_accepts: args.max_accepts,
        tick_interval: Duration::from_millis(args.tick_ms),
        listen_backlog: args.backlog,
    };

    let server = Server::bind(config).await?;
    tracing::info!("Server listening on {}", server.local_addr());

    let input = BufReader::new(stdin());
    tokio::select! {
        result = console::run(&server, &trace, input, stdout()) => {
            if let Err(e) = result {
                tracing::error!("Console error: {}", e);
            }
        },
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Signal handler error: {}", e);
            }
        },
    }

    server.shutdown().await;
    Ok(())
}
