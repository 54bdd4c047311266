//! Typed client requests and server notifications.
//!
//! Clients send loosely-structured JSON objects. [`ClientMessage::from_value`]
//! is the only place that inspects their fields, so a missing or mistyped
//! field becomes an explicit [`ProtocolError`] instead of an assumption buried
//! in session logic.
//!
//! Server notifications are built from [`ServerMessage`] and serialized with
//! [`ServerMessage::to_value`]. Game notifications share `"type":"tictactoe"`
//! and are told apart by `subtype`.

use std::fmt;

use serde_json::{Map, Value, json};

use crate::{
    error::{ProtocolError, Result},
    frame::encode_frame,
};

/// Session types a client may ask the server to create or join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Two-player tic-tac-toe
    TicTacToe,
}

impl SessionKind {
    /// Name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::TicTacToe => "tictactoe",
        }
    }

    /// Look up a session type by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tictactoe" => Some(Self::TicTacToe),
            _ => None,
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two seats in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSlot {
    /// First joiner, moves first
    One,
    /// Second joiner
    Two,
}

impl PlayerSlot {
    /// Seat number used on the wire (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// The opposing seat.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Three in a line for this seat
    Winner(PlayerSlot),
    /// Board filled with no line
    Draw,
}

impl Outcome {
    /// Value of the `winner` field: 1, 2, or -1 for a draw.
    pub fn code(self) -> i8 {
        match self {
            Self::Winner(slot) => slot.number() as i8,
            Self::Draw => -1,
        }
    }
}

/// Game-specific request carried by a `"type":"tictactoe"` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRequest {
    /// Display name, accepted while the game is waiting for players
    SetName(String),
    /// Place a symbol. Coordinates are unchecked here; the game validates
    /// them against its board.
    Move {
        /// Board row
        row: i64,
        /// Board column
        col: i64,
    },
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Reflect this document back to the sender
    Echo(Value),
    /// Create or join a session of the named type
    ServiceCreate {
        /// Session type name, e.g. `"tictactoe"`
        name: String,
    },
    /// Input for a game session
    Game(GameRequest),
}

impl ClientMessage {
    /// Interpret a decoded frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::NotAnObject` if the document is not an object
    /// - `ProtocolError::MissingField` / `ProtocolError::InvalidField` if a
    ///   required field is absent or mistyped
    /// - `ProtocolError::UnknownType` if `type` names no known message
    pub fn from_value(value: Value) -> Result<Self> {
        let object = value.as_object().ok_or(ProtocolError::NotAnObject(json_kind(&value)))?;
        let kind = required_str(object, "type")?;

        if kind.eq_ignore_ascii_case("echo") {
            return Ok(Self::Echo(value));
        }

        match kind {
            "service_create" => {
                Ok(Self::ServiceCreate { name: required_str(object, "name")?.to_string() })
            },
            "tictactoe" => {
                if object.contains_key("name") {
                    let name = required_str(object, "name")?;
                    Ok(Self::Game(GameRequest::SetName(name.to_string())))
                } else {
                    let row = required_int(object, "row")?;
                    let col = required_int(object, "col")?;
                    Ok(Self::Game(GameRequest::Move { row, col }))
                }
            },
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// A notification sent from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Echo reply: the sender's document, re-serialized
    Echo(Value),
    /// A game has both players and is about to collect names
    GameStart {
        /// Which game
        kind: SessionKind,
    },
    /// Both names are known. Sent to each player individually.
    SetPlayers {
        /// Name of the first seat
        player1_name: String,
        /// Name of the second seat
        player2_name: String,
        /// Seat of the recipient
        assigned_to: PlayerSlot,
    },
    /// It is now this seat's turn
    SetTurn {
        /// Seat to move
        player: PlayerSlot,
    },
    /// A legal move was played
    Move {
        /// Seat that moved
        player: PlayerSlot,
        /// Board row
        row: usize,
        /// Board column
        col: usize,
    },
    /// Game over
    Finished {
        /// Winner or draw
        outcome: Outcome,
    },
    /// Game aborted because a player disconnected
    Canceled,
}

impl ServerMessage {
    /// JSON document for this message.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Echo(document) => document.clone(),
            Self::GameStart { kind } => json!({ "type": "game_start", "game": kind.name() }),
            Self::SetPlayers { player1_name, player2_name, assigned_to } => json!({
                "type": "tictactoe",
                "subtype": "setplayers",
                "player1_name": player1_name,
                "player2_name": player2_name,
                "assigned_to": assigned_to.number(),
            }),
            Self::SetTurn { player } => {
                json!({ "type": "tictactoe", "subtype": "setturn", "player": player.number() })
            },
            Self::Move { player, row, col } => json!({
                "type": "tictactoe",
                "subtype": "move",
                "player": player.number(),
                "row": row,
                "col": col,
            }),
            Self::Finished { outcome } => {
                json!({ "type": "tictactoe", "subtype": "result", "winner": outcome.code() })
            },
            Self::Canceled => json!({ "type": "tictactoe", "subtype": "canceled" }),
        }
    }

    /// Encode as a delimited frame.
    ///
    /// # Errors
    ///
    /// See [`encode_frame`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_frame(&self.to_value())
    }
}

fn required_str<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a str> {
    object
        .get(field)
        .ok_or(ProtocolError::MissingField(field))?
        .as_str()
        .ok_or(ProtocolError::InvalidField { field, expected: "a string" })
}

fn required_int(object: &Map<String, Value>, field: &'static str) -> Result<i64> {
    object
        .get(field)
        .ok_or(ProtocolError::MissingField(field))?
        .as_i64()
        .ok_or(ProtocolError::InvalidField { field, expected: "an integer" })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
