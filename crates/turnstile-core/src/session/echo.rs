//! Echo session: every document is reflected to its sender.

use std::collections::VecDeque;

use serde_json::Value;
use turnstile_proto::ServerMessage;

use super::{Session, SessionAction, SessionId};
use crate::{ConnectionId, error::SessionError, fsm::StateMachine, fsm::States};

/// The echo session's only state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EchoState {
    /// Reflecting queued documents
    Relay,
}

#[derive(Debug, Default)]
struct Relay {
    inbox: VecDeque<(ConnectionId, Value)>,
    outbox: Vec<SessionAction>,
}

impl States for Relay {
    type Id = EchoState;

    fn on_enter(&mut self, _: EchoState, _: Option<EchoState>) -> Option<EchoState> {
        None
    }

    fn on_update(&mut self, _: EchoState) -> Option<EchoState> {
        while let Some((to, document)) = self.inbox.pop_front() {
            self.outbox.push(SessionAction::Send { to, message: ServerMessage::Echo(document) });
        }
        None
    }

    fn on_leave(&mut self, _: EchoState, _: Option<EchoState>) {
        self.inbox.clear();
    }
}

/// Session answering `echo` messages.
///
/// Serves every connection; there is exactly one per manager and it is never
/// disposed.
#[derive(Debug)]
pub struct EchoSession {
    id: SessionId,
    fsm: StateMachine<EchoState>,
    relay: Relay,
}

impl EchoSession {
    /// Create the session, already in its relay state.
    pub fn new(id: SessionId) -> Result<Self, SessionError> {
        let mut fsm = StateMachine::new();
        let mut relay = Relay::default();
        fsm.register_state(EchoState::Relay);
        fsm.set_state(&mut relay, EchoState::Relay)?;
        Ok(Self { id, fsm, relay })
    }

    /// Documents queued and not yet reflected.
    pub fn pending(&self) -> usize {
        self.relay.inbox.len()
    }
}

impl Session for EchoSession {
    type Input = Value;

    fn id(&self) -> SessionId {
        self.id
    }

    fn accept(&mut self, from: ConnectionId, document: Value) {
        self.relay.inbox.push_back((from, document));
    }

    fn tick(
        &mut self,
        is_live: &dyn Fn(ConnectionId) -> bool,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), SessionError> {
        self.relay.inbox.retain(|(from, _)| is_live(*from));
        self.fsm.update(&mut self.relay)?;
        actions.append(&mut self.relay.outbox);
        Ok(())
    }

    fn remove_connection(&mut self, connection: ConnectionId) {
        self.relay.inbox.retain(|(from, _)| *from != connection);
    }

    fn is_disposable(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {
        self.fsm.reset(&mut self.relay, true);
    }
}
