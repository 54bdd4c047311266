//! Session manager
//!
//! Owns the echo session and every live game session. It routes decoded
//! frames to the right session, matches `service_create` requests against
//! open games, and disposes of games that have run their course.
//!
//! The manager never touches the network. Each call returns the
//! [`SessionAction`]s the I/O layer should perform.

use serde_json::Value;
use turnstile_proto::{ClientMessage, SessionKind};

use crate::{
    ConnectionId,
    error::SessionError,
    session::{Session, SessionAction, SessionId, echo::EchoSession, tictactoe::GameSession},
};

/// Routes frames to sessions and runs their ticks.
#[derive(Debug)]
pub struct SessionManager {
    echo: EchoSession,
    games: Vec<GameSession>,
    next_session: u64,
}

impl SessionManager {
    /// Create a manager with its echo session and no games.
    pub fn new() -> Result<Self, SessionError> {
        Ok(Self { echo: EchoSession::new(SessionId(0))?, games: Vec::new(), next_session: 1 })
    }

    /// Route one decoded frame from `from`.
    ///
    /// Echo and game input is queued for the next tick. A `service_create`
    /// takes effect immediately and may return `game_start` notifications.
    ///
    /// # Errors
    ///
    /// - `SessionError::Rejected` if the frame is not a known request
    /// - `SessionError::UnknownSessionType` for an unsupported session name
    /// - `SessionError::AlreadySeated` if `from` already sits at a game
    pub fn handle_frame(
        &mut self,
        from: ConnectionId,
        document: Value,
    ) -> Result<Vec<SessionAction>, SessionError> {
        match ClientMessage::from_value(document)? {
            ClientMessage::Echo(document) => {
                self.echo.accept(from, document);
                Ok(Vec::new())
            },
            ClientMessage::ServiceCreate { name } => {
                let kind = SessionKind::from_name(&name)
                    .ok_or(SessionError::UnknownSessionType(name))?;
                self.create_or_enter(from, kind)
            },
            ClientMessage::Game(request) => {
                for game in &mut self.games {
                    game.accept(from, request.clone());
                }
                Ok(Vec::new())
            },
        }
    }

    /// Seat `from` in the first open session of `kind`, creating one if none
    /// is open.
    pub fn create_or_enter(
        &mut self,
        from: ConnectionId,
        kind: SessionKind,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if let Some(game) = self.games.iter().find(|game| game.is_member(from)) {
            return Err(SessionError::AlreadySeated { connection: from, session: game.id() });
        }

        let open = self.games.iter().position(|game| game.kind() == kind && game.is_open());
        let index = match open {
            Some(index) => index,
            None => {
                let id = SessionId(self.next_session);
                self.next_session += 1;
                self.games.push(GameSession::new(id)?);
                tracing::debug!(session = %id, %kind, "session created");
                self.games.len() - 1
            },
        };

        let game = &mut self.games[index];
        game.join(from)?;
        Ok(game.drain_actions())
    }

    /// Advance every session once, then drop finished games.
    ///
    /// `is_live` answers whether a connection is still registered.
    pub fn tick(&mut self, is_live: impl Fn(ConnectionId) -> bool) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if let Err(e) = self.echo.tick(&is_live, &mut actions) {
            tracing::error!(session = %self.echo.id(), error = %e, "echo tick failed");
        }
        for game in &mut self.games {
            if let Err(e) = game.tick(&is_live, &mut actions) {
                tracing::error!(session = %game.id(), error = %e, "game tick failed");
            }
        }

        self.flush();
        actions
    }

    /// Forget a torn-down connection everywhere.
    pub fn remove_connection(&mut self, connection: ConnectionId) {
        self.echo.remove_connection(connection);
        for game in &mut self.games {
            game.remove_connection(connection);
        }
    }

    /// Number of live game sessions.
    pub fn session_count(&self) -> usize {
        self.games.len()
    }

    /// Live game sessions, oldest first.
    pub fn games(&self) -> &[GameSession] {
        &self.games
    }

    /// Stop every session, running each current state's leave hook.
    pub fn shutdown(&mut self) {
        self.echo.shutdown();
        for game in &mut self.games {
            game.shutdown();
        }
        tracing::info!(games = self.games.len(), "sessions shut down");
        self.games.clear();
    }

    fn flush(&mut self) {
        let before = self.games.len();
        self.games.retain(|game| !game.is_disposable());
        let disposed = before - self.games.len();
        if disposed > 0 {
            tracing::debug!(disposed, remaining = self.games.len(), "sessions disposed");
        }
    }
}
