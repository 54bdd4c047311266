//! Two-player tic-tac-toe session.
//!
//! # States
//!
//! - `Wait`: collects members (up to two) and their names. When the second
//!   member joins, each member that has not been told yet gets `game_start`,
//!   so a member who stays seated while the other seat is refilled hears it
//!   once. Once both names are known each player gets its own `setplayers`
//!   and play begins.
//! - `Player1Turn` / `Player2Turn`: announce `setturn` on entry, then consume
//!   moves from the active player until one is legal.
//! - `CheckResult`: transient. Decides win, draw, or the other player's turn.
//! - `GameCanceled`: transient. Tells the remaining member the game is off.
//!
//! Finished and canceled games both return to `Wait` with an empty table, at
//! which point the manager disposes of the session.

use std::collections::VecDeque;

use turnstile_proto::{GameRequest, Outcome, PlayerSlot, ServerMessage, SessionKind};

use super::{
    Session, SessionAction, SessionId,
    board::{Board, Symbol, Verdict},
};
use crate::{
    ConnectionId,
    error::SessionError,
    fsm::{StateMachine, States},
};

/// Game states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    /// Gathering members and names
    Wait,
    /// Waiting for player one's move
    Player1Turn,
    /// Waiting for player two's move
    Player2Turn,
    /// Evaluating the last move
    CheckResult,
    /// A player vanished mid-game
    GameCanceled,
}

impl GameState {
    const ALL: [Self; 5] =
        [Self::Wait, Self::Player1Turn, Self::Player2Turn, Self::CheckResult, Self::GameCanceled];

    fn turn(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::One => Self::Player1Turn,
            PlayerSlot::Two => Self::Player2Turn,
        }
    }
}

const SLOTS: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

fn seat_index(slot: PlayerSlot) -> usize {
    match slot {
        PlayerSlot::One => 0,
        PlayerSlot::Two => 1,
    }
}

#[derive(Debug, Clone, Default)]
struct Seat {
    connection: Option<ConnectionId>,
    name: String,
    started: bool,
}

impl Seat {
    fn vacate(&mut self) {
        self.connection = None;
        self.name.clear();
        self.started = false;
    }
}

/// Everything the game states read and write.
#[derive(Debug)]
struct Table {
    session: SessionId,
    seats: [Seat; 2],
    board: Board,
    last_move: Option<(PlayerSlot, usize, usize)>,
    inbox: VecDeque<(ConnectionId, GameRequest)>,
    outbox: Vec<SessionAction>,
}

impl Table {
    fn new(session: SessionId) -> Self {
        Self {
            session,
            seats: Default::default(),
            board: Board::new(),
            last_move: None,
            inbox: VecDeque::new(),
            outbox: Vec::new(),
        }
    }

    fn seat(&self, slot: PlayerSlot) -> &Seat {
        &self.seats[seat_index(slot)]
    }

    fn slot_of(&self, connection: ConnectionId) -> Option<PlayerSlot> {
        SLOTS.into_iter().find(|&slot| self.seat(slot).connection == Some(connection))
    }

    fn members(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.seats.iter().filter_map(|seat| seat.connection)
    }

    fn send(&mut self, to: ConnectionId, message: ServerMessage) {
        self.outbox.push(SessionAction::Send { to, message });
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let members: Vec<ConnectionId> = self.members().collect();
        for to in members {
            self.send(to, message.clone());
        }
    }

    fn clear(&mut self) {
        for seat in &mut self.seats {
            seat.vacate();
        }
        self.inbox.clear();
        self.board.reset();
        self.last_move = None;
    }

    fn collect_names(&mut self) -> Option<GameState> {
        while let Some((from, request)) = self.inbox.pop_front() {
            let Some(slot) = self.slot_of(from) else { continue };
            match request {
                GameRequest::SetName(name) => {
                    tracing::debug!(session = %self.session, player = slot.number(), %name, "player named");
                    self.seats[seat_index(slot)].name = name;
                },
                GameRequest::Move { .. } => {
                    tracing::debug!(session = %self.session, %from, "move before game start ignored");
                },
            }
        }

        let ready = self.seats.iter().all(|seat| seat.connection.is_some() && !seat.name.is_empty());
        if !ready {
            return None;
        }

        for slot in SLOTS {
            if let Some(to) = self.seat(slot).connection {
                let message = ServerMessage::SetPlayers {
                    player1_name: self.seat(PlayerSlot::One).name.clone(),
                    player2_name: self.seat(PlayerSlot::Two).name.clone(),
                    assigned_to: slot,
                };
                self.send(to, message);
            }
        }
        Some(GameState::Player1Turn)
    }

    fn play_turn(&mut self, active: PlayerSlot) -> Option<GameState> {
        while let Some((from, request)) = self.inbox.pop_front() {
            if self.slot_of(from) != Some(active) {
                tracing::debug!(session = %self.session, %from, "input out of turn ignored");
                continue;
            }
            let GameRequest::Move { row, col } = request else {
                tracing::debug!(session = %self.session, %from, "name change during play ignored");
                continue;
            };

            match self.board.place(row, col, Symbol::of(active)) {
                Ok((row, col)) => {
                    self.last_move = Some((active, row, col));
                    self.broadcast(&ServerMessage::Move { player: active, row, col });
                    return Some(GameState::CheckResult);
                },
                Err(e) => {
                    tracing::debug!(session = %self.session, player = active.number(), error = %e, "illegal move ignored");
                },
            }
        }
        None
    }

    fn check_result(&mut self) -> GameState {
        let Some((mover, row, col)) = self.last_move else {
            tracing::error!(session = %self.session, "result check without a move");
            return GameState::Wait;
        };

        let outcome = match self.board.evaluate(row, col) {
            Verdict::Win(_) => Outcome::Winner(mover),
            Verdict::Draw => Outcome::Draw,
            Verdict::Continue => return GameState::turn(mover.other()),
        };

        tracing::info!(session = %self.session, ?outcome, board = %self.board, "game finished");
        self.broadcast(&ServerMessage::Finished { outcome });
        GameState::Wait
    }
}

impl States for Table {
    type Id = GameState;

    fn on_enter(&mut self, state: GameState, previous: Option<GameState>) -> Option<GameState> {
        match state {
            GameState::Wait => {
                if previous.is_some() {
                    self.clear();
                }
                None
            },
            GameState::Player1Turn => {
                self.broadcast(&ServerMessage::SetTurn { player: PlayerSlot::One });
                None
            },
            GameState::Player2Turn => {
                self.broadcast(&ServerMessage::SetTurn { player: PlayerSlot::Two });
                None
            },
            GameState::CheckResult => Some(self.check_result()),
            GameState::GameCanceled => {
                tracing::info!(session = %self.session, "game canceled");
                self.broadcast(&ServerMessage::Canceled);
                Some(GameState::Wait)
            },
        }
    }

    fn on_update(&mut self, state: GameState) -> Option<GameState> {
        match state {
            GameState::Wait => self.collect_names(),
            GameState::Player1Turn => self.play_turn(PlayerSlot::One),
            GameState::Player2Turn => self.play_turn(PlayerSlot::Two),
            GameState::CheckResult | GameState::GameCanceled => None,
        }
    }

    fn on_leave(&mut self, state: GameState, next: Option<GameState>) {
        tracing::trace!(session = %self.session, ?state, ?next, "leaving state");
    }
}

/// A tic-tac-toe table for two connections.
#[derive(Debug)]
pub struct GameSession {
    fsm: StateMachine<GameState>,
    table: Table,
}

impl GameSession {
    /// Create an empty session in [`GameState::Wait`].
    pub fn new(id: SessionId) -> Result<Self, SessionError> {
        let mut fsm = StateMachine::new();
        let mut table = Table::new(id);
        for state in GameState::ALL {
            fsm.register_state(state);
        }
        fsm.set_state(&mut table, GameState::Wait)?;
        Ok(Self { fsm, table })
    }

    /// Session type.
    pub fn kind(&self) -> SessionKind {
        SessionKind::TicTacToe
    }

    /// Current state, `None` after shutdown.
    pub fn state(&self) -> Option<GameState> {
        self.fsm.state().ok()
    }

    /// Board as it stands.
    pub fn board(&self) -> &Board {
        &self.table.board
    }

    /// Connection holding `slot`.
    pub fn player(&self, slot: PlayerSlot) -> Option<ConnectionId> {
        self.table.seat(slot).connection
    }

    /// Whether `connection` holds a seat.
    pub fn is_member(&self, connection: ConnectionId) -> bool {
        self.table.slot_of(connection).is_some()
    }

    /// Number of occupied seats.
    pub fn member_count(&self) -> usize {
        self.table.members().count()
    }

    /// Whether a new member could join right now.
    pub fn is_open(&self) -> bool {
        self.fsm.is_in(GameState::Wait) && self.member_count() < SLOTS.len()
    }

    /// Seat `connection`. The second join starts the game.
    pub fn join(&mut self, connection: ConnectionId) -> Result<PlayerSlot, SessionError> {
        let session = self.table.session;
        let vacant = SLOTS.into_iter().find(|&slot| self.table.seat(slot).connection.is_none());
        let slot = match vacant {
            Some(slot) if self.is_open() => slot,
            _ => return Err(SessionError::SessionFull { session, kind: self.kind() }),
        };

        let seat = &mut self.table.seats[seat_index(slot)];
        seat.vacate();
        seat.connection = Some(connection);
        tracing::info!(%session, %connection, player = slot.number(), "joined game");

        if self.member_count() == SLOTS.len() {
            self.table.board.reset();
            self.table.last_move = None;
            let start = ServerMessage::GameStart { kind: self.kind() };
            for slot in SLOTS {
                let seat = &mut self.table.seats[seat_index(slot)];
                if seat.started {
                    continue;
                }
                seat.started = true;
                if let Some(to) = seat.connection {
                    self.table.send(to, start.clone());
                }
            }
        }
        Ok(slot)
    }

    /// Take the actions produced outside of a tick.
    pub fn drain_actions(&mut self) -> Vec<SessionAction> {
        std::mem::take(&mut self.table.outbox)
    }
}

impl Session for GameSession {
    type Input = GameRequest;

    fn id(&self) -> SessionId {
        self.table.session
    }

    fn accept(&mut self, from: ConnectionId, request: GameRequest) {
        if self.is_member(from) {
            self.table.inbox.push_back((from, request));
        }
    }

    fn tick(
        &mut self,
        is_live: &dyn Fn(ConnectionId) -> bool,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), SessionError> {
        let state = self.fsm.state()?;
        let session = self.table.session;

        let mut lost = false;
        for seat in &mut self.table.seats {
            match seat.connection {
                Some(connection) if !is_live(connection) => {
                    tracing::debug!(%session, %connection, "member connection gone");
                    seat.vacate();
                    lost = true;
                },
                Some(_) => {},
                None => lost |= state != GameState::Wait,
            }
        }

        if lost && state != GameState::Wait {
            self.fsm.set_state(&mut self.table, GameState::GameCanceled)?;
        } else {
            self.fsm.update(&mut self.table)?;
        }

        actions.append(&mut self.table.outbox);
        Ok(())
    }

    fn remove_connection(&mut self, connection: ConnectionId) {
        if let Some(slot) = self.table.slot_of(connection) {
            self.table.seats[seat_index(slot)].vacate();
        }
        self.table.inbox.retain(|(from, _)| *from != connection);
    }

    fn is_disposable(&self) -> bool {
        self.fsm.is_in(GameState::Wait) && self.member_count() == 0
    }

    fn shutdown(&mut self) {
        self.fsm.reset(&mut self.table, true);
    }
}
