//! Property-based tests for the state machine engine

use proptest::prelude::*;
use turnstile_core::{FsmError, StateMachine, States};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Id(u8);

#[derive(Debug, PartialEq, Eq)]
enum Event {
    Enter(Id, Option<Id>),
    Leave(Id, Option<Id>),
}

#[derive(Default)]
struct Journal {
    events: Vec<Event>,
}

impl States for Journal {
    type Id = Id;

    fn on_enter(&mut self, state: Id, previous: Option<Id>) -> Option<Id> {
        self.events.push(Event::Enter(state, previous));
        None
    }

    fn on_update(&mut self, _: Id) -> Option<Id> {
        None
    }

    fn on_leave(&mut self, state: Id, next: Option<Id>) {
        self.events.push(Event::Leave(state, next));
    }
}

proptest! {
    /// Property: every real transition is exactly one leave followed by one enter
    #[test]
    fn prop_transitions_pair_leave_with_enter(targets in prop::collection::vec(0u8..4, 1..50)) {
        let mut fsm = StateMachine::new();
        for id in 0..4 {
            fsm.register_state(Id(id));
        }
        let mut journal = Journal::default();

        let mut expected = Vec::new();
        let mut current: Option<Id> = None;
        for target in targets {
            let target = Id(target);
            fsm.set_state(&mut journal, target)?;
            if current != Some(target) {
                if let Some(previous) = current {
                    expected.push(Event::Leave(previous, Some(target)));
                }
                expected.push(Event::Enter(target, current));
                current = Some(target);
            }
            prop_assert_eq!(fsm.state(), Ok(target));
        }

        prop_assert_eq!(journal.events, expected);
    }

    /// Property: unregistered targets never change the current state
    #[test]
    fn prop_unregistered_target_is_inert(start in 0u8..4, target in 4u8..8) {
        let mut fsm = StateMachine::new();
        for id in 0..4 {
            fsm.register_state(Id(id));
        }
        let mut journal = Journal::default();
        fsm.set_state(&mut journal, Id(start))?;

        let result = fsm.set_state(&mut journal, Id(target));

        prop_assert!(matches!(result, Err(FsmError::UnregisteredState(_))));
        prop_assert_eq!(fsm.state(), Ok(Id(start)));
        prop_assert_eq!(journal.events.len(), 1);
    }
}
