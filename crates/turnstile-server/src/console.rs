//! Operator console.
//!
//! Reads one command per line. A leading backtick is accepted and ignored,
//! so `` `client_size `` and `client_size` are the same command. Anything
//! unrecognized prints the command list.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Server, error::ServerError};

/// Command list shown for unknown input.
pub const HELP: &str =
    "commands: client_size | accept_size | enable_trace | disable_trace | shutdown";

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the number of registered connections
    ClientSize,
    /// Print the number of outstanding accepts
    AcceptSize,
    /// Switch logging to trace level
    EnableTrace,
    /// Restore the startup log level
    DisableTrace,
    /// Stop the server
    Shutdown,
    /// Print the command list
    Help,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim();
        let word = word.strip_prefix('`').unwrap_or(word).trim();
        if word.is_empty() {
            return None;
        }

        Some(match word {
            "client_size" => Self::ClientSize,
            "accept_size" => Self::AcceptSize,
            "enable_trace" => Self::EnableTrace,
            "disable_trace" => Self::DisableTrace,
            "shutdown" => Self::Shutdown,
            _ => Self::Help,
        })
    }
}

/// Runtime switch for trace-level logging.
pub trait TraceControl {
    /// Turn trace logging on or off.
    fn set_trace(&self, enabled: bool) -> Result<(), ServerError>;
}

/// Execute commands from `input` until `shutdown` or end of input.
///
/// Replies go to `output`. The caller shuts the server down afterwards.
pub async fn run<R, W>(
    server: &Server,
    trace: &dyn TraceControl,
    input: R,
    mut output: W,
) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else { continue };

        let reply = match command {
            Command::ClientSize => format!("clients: {}", server.connection_count()),
            Command::AcceptSize => format!("pending accepts: {}", server.outstanding_accepts()),
            Command::EnableTrace => {
                trace.set_trace(true)?;
                "trace logging enabled".to_string()
            },
            Command::DisableTrace => {
                trace.set_trace(false)?;
                "trace logging disabled".to_string()
            },
            Command::Shutdown => {
                output.write_all(b"shutting down\n").await?;
                output.flush().await?;
                return Ok(());
            },
            Command::Help => HELP.to_string(),
        };

        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    tracing::info!("console input closed");
    Ok(())
}
