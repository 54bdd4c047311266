//! Fuzz target for session matchmaking and game play
//!
//! # Strategy
//!
//! - Connections: a small fixed pool that joins, plays, and disconnects in
//!   arbitrary order
//! - Requests: valid and invalid moves, names, unknown session types
//!
//! # Invariants
//!
//! - No connection ever sits in two games
//! - Every live game has at most two members
//! - Waiting games with no members never survive a tick
//! - NEVER panic on any request order

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::json;
use turnstile_core::{Arena, ConnectionId, GameState, SessionManager};

const CONNECTIONS: usize = 6;

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    Create { who: u8 },
    CreateUnknown { who: u8 },
    Name { who: u8, name: String },
    Move { who: u8, row: i8, col: i8 },
    Echo { who: u8 },
    Disconnect { who: u8 },
    Tick,
}

fuzz_target!(|steps: Vec<Step>| {
    let Ok(mut manager) = SessionManager::new() else { return };
    let mut arena = Arena::new();
    let mut ids: Vec<ConnectionId> = (0..CONNECTIONS).map(|_| arena.insert(())).collect();
    let pick = |who: u8| usize::from(who) % CONNECTIONS;

    for step in steps {
        match step {
            Step::Create { who } => {
                let doc = json!({"type": "service_create", "name": "tictactoe"});
                let _ = manager.handle_frame(ids[pick(who)], doc);
            },
            Step::CreateUnknown { who } => {
                let doc = json!({"type": "service_create", "name": "chess"});
                assert!(manager.handle_frame(ids[pick(who)], doc).is_err());
            },
            Step::Name { who, name } => {
                let doc = json!({"type": "tictactoe", "name": name});
                let _ = manager.handle_frame(ids[pick(who)], doc);
            },
            Step::Move { who, row, col } => {
                let doc = json!({"type": "tictactoe", "row": row, "col": col});
                let _ = manager.handle_frame(ids[pick(who)], doc);
            },
            Step::Echo { who } => {
                let _ = manager.handle_frame(ids[pick(who)], json!({"type": "echo"}));
            },
            Step::Disconnect { who } => {
                let slot = pick(who);
                let gone = ids[slot];
                arena.remove(gone);
                manager.remove_connection(gone);
                ids[slot] = arena.insert(());
            },
            Step::Tick => {
                manager.tick(|id| arena.contains(id));
                for game in manager.games() {
                    assert!(!(game.state() == Some(GameState::Wait) && game.member_count() == 0));
                }
            },
        }

        for game in manager.games() {
            assert!(game.member_count() <= 2);
        }
        for id in &ids {
            assert!(manager.games().iter().filter(|g| g.is_member(*id)).count() <= 1);
        }
    }
});
