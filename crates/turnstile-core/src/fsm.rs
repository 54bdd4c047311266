//! Named-state machine engine.
//!
//! [`StateMachine`] tracks which registered state is current and drives the
//! callbacks of a host implementing [`States`]. Hosts keep all their data
//! themselves; the engine only owns the state identifiers, which lets a
//! session hold both side by side and borrow them independently.
//!
//! # Transitions
//!
//! `set_state(next)` with a current state `prev`:
//!
//! 1. `on_leave(prev, Some(next))`
//! 2. current becomes `next`
//! 3. `on_enter(next, Some(prev))`
//!
//! An enter callback may ask for a further transition by returning the next
//! state. The engine runs that transition only after the enter callback has
//! returned, so every leave/enter pair stays ordered and no callback ever
//! runs nested inside another. Requests from `on_update` are applied the same
//! way. Setting the state that is already current is a no-op.

use std::{collections::HashSet, fmt, hash::Hash};

use crate::error::FsmError;

/// Upper bound on transitions chained through enter callbacks in one call.
pub const MAX_CHAINED_TRANSITIONS: usize = 32;

/// Callbacks invoked by a [`StateMachine`].
pub trait States {
    /// State identifier.
    type Id: Copy + Eq + Hash + fmt::Debug;

    /// Called after `state` became current. Return a state to move on to it.
    fn on_enter(&mut self, state: Self::Id, previous: Option<Self::Id>) -> Option<Self::Id>;

    /// Called once per [`StateMachine::update`].
    fn on_update(&mut self, state: Self::Id) -> Option<Self::Id>;

    /// Called before `state` stops being current. `next` is `None` on reset.
    fn on_leave(&mut self, state: Self::Id, next: Option<Self::Id>);
}

/// Current-state tracker over a set of registered states.
#[derive(Debug, Clone)]
pub struct StateMachine<S> {
    registered: HashSet<S>,
    current: Option<S>,
}

impl<S: Copy + Eq + Hash + fmt::Debug> Default for StateMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Copy + Eq + Hash + fmt::Debug> StateMachine<S> {
    /// Create a machine with no states and no current state.
    pub fn new() -> Self {
        Self { registered: HashSet::new(), current: None }
    }

    /// Make `state` a legal transition target. Returns `false` if it already
    /// was.
    pub fn register_state(&mut self, state: S) -> bool {
        self.registered.insert(state)
    }

    /// Whether `state` is registered.
    pub fn is_registered(&self, state: S) -> bool {
        self.registered.contains(&state)
    }

    /// Current state.
    pub fn state(&self) -> Result<S, FsmError> {
        self.current.ok_or(FsmError::NotStarted)
    }

    /// Whether the current state is `state`.
    pub fn is_in(&self, state: S) -> bool {
        self.current == Some(state)
    }

    /// Transition to `state`, then follow any transitions requested by the
    /// enter callbacks.
    pub fn set_state<H>(&mut self, host: &mut H, state: S) -> Result<(), FsmError>
    where
        H: States<Id = S>,
    {
        let mut target = Some(state);
        let mut hops = 0;

        while let Some(next) = target.take() {
            if !self.registered.contains(&next) {
                return Err(FsmError::UnregisteredState(format!("{next:?}")));
            }
            if self.current == Some(next) {
                break;
            }
            if hops == MAX_CHAINED_TRANSITIONS {
                return Err(FsmError::TransitionLoop { limit: MAX_CHAINED_TRANSITIONS });
            }
            hops += 1;

            let previous = self.current;
            if let Some(previous) = previous {
                host.on_leave(previous, Some(next));
            }
            tracing::trace!(from = ?previous, to = ?next, "state transition");
            self.current = Some(next);
            target = host.on_enter(next, previous);
        }

        Ok(())
    }

    /// Run the current state's update callback once and apply the
    /// transition it requests.
    pub fn update<H>(&mut self, host: &mut H) -> Result<(), FsmError>
    where
        H: States<Id = S>,
    {
        let current = self.state()?;
        match host.on_update(current) {
            Some(next) => self.set_state(host, next),
            None => Ok(()),
        }
    }

    /// Forget the current state, optionally running its leave callback.
    pub fn reset<H>(&mut self, host: &mut H, invoke_leave: bool)
    where
        H: States<Id = S>,
    {
        let current = self.current.take();
        if let (Some(current), true) = (current, invoke_leave) {
            host.on_leave(current, None);
        }
    }
}
