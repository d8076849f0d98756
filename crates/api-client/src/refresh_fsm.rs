//! Token refresh state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │      Idle       │ (initial)
//! └────────┬────────┘
//!          │ RefreshStarted (first 401 of a cycle)
//!          ▼
//! ┌─────────────────┐
//! │   Refreshing    │ further 401s queue as waiters
//! └────────┬────────┘
//!          │ RefreshSucceeded / RefreshFailed
//!          ▼
//!        Idle
//! ```
//!
//! `Refreshing` is the "refresh in flight" flag. At most one refresh is
//! outstanding because `RefreshStarted` is only accepted from `Idle`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub refresh_machine(Idle)

    Idle => {
        RefreshStarted => Refreshing
    },
    Refreshing => {
        RefreshSucceeded => Idle,
        RefreshFailed => Idle
    }
}

pub use refresh_machine::Input as RefreshMachineInput;
pub use refresh_machine::State as RefreshMachineState;
pub use refresh_machine::StateMachine as RefreshMachine;

/// Public view of the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// No refresh in flight.
    Idle,
    /// A refresh call is outstanding; new 401s are queued.
    Refreshing,
}

impl From<&RefreshMachineState> for RefreshState {
    fn from(state: &RefreshMachineState) -> Self {
        match state {
            RefreshMachineState::Idle => RefreshState::Idle,
            RefreshMachineState::Refreshing => RefreshState::Refreshing,
        }
    }
}

impl RefreshState {
    pub fn is_refreshing(&self) -> bool {
        matches!(self, RefreshState::Refreshing)
    }
}
