//! The job state machine: a small tagged variant plus a table of allowed
//! transitions. Illegal transitions are rejected explicitly rather than
//! relying on ordering by accident.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a [`super::Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Persisted but not yet queued for submission/execution.
    Hold,
    /// Accepted by the backend (or ready to run locally), not yet started.
    Queued,
    /// Currently executing.
    Running,
    /// Completed successfully. Terminal.
    Done,
    /// Completed unsuccessfully. Terminal unless restarted.
    Failed,
    /// Canceled by the operator or an upstream failure. Terminal unless restarted.
    Canceled,
}

impl State {
    /// Terminal states are not automatically progressed further.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Done | State::Failed | State::Canceled)
    }

    /// States considered "active" for the Reconciler's output-collision
    /// check.
    pub fn is_active(self) -> bool {
        matches!(self, State::Queued | State::Running | State::Hold)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Hold => "Hold",
            State::Queued => "Queued",
            State::Running => "Running",
            State::Done => "Done",
            State::Failed => "Failed",
            State::Canceled => "Canceled",
        };
        write!(f, "{s}")
    }
}

/// Error produced by an illegal state transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// The transition is not allowed by the state machine.
    #[error("cannot transition from {from} to {to}")]
    IllegalTransition {
        /// The state the job was in.
        from: State,
        /// The state that was requested.
        to: State,
    },
    /// Restart was requested from a non-restartable state.
    #[error("job in state {0} is not restartable; only Failed and Canceled are")]
    NotRestartable(State),
}

/// Validate a proposed transition against the allowed-transition table:
/// `Hold -> Queued -> Running -> {Done | Failed | Canceled}`; `Canceled`
/// reachable from any non-terminal state; restart, which resets a terminal
/// state back to `Queued`, goes through [`super::Job::restart`] instead of
/// this function.
pub fn validate_transition(from: State, to: State) -> Result<(), StateError> {
    let allowed = match from {
        State::Hold => matches!(to, State::Queued | State::Canceled),
        State::Queued => matches!(to, State::Running | State::Canceled),
        State::Running => matches!(to, State::Done | State::Failed | State::Canceled),
        State::Done | State::Failed | State::Canceled => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_to_queued_is_allowed() {
        assert!(validate_transition(State::Hold, State::Queued).is_ok());
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        for terminal in [State::Done, State::Failed, State::Canceled] {
            for to in [
                State::Hold,
                State::Queued,
                State::Running,
                State::Done,
                State::Failed,
                State::Canceled,
            ] {
                assert!(validate_transition(terminal, to).is_err());
            }
        }
    }

    #[test]
    fn cancel_reachable_from_any_non_terminal_state() {
        for from in [State::Hold, State::Queued, State::Running] {
            assert!(validate_transition(from, State::Canceled).is_ok());
        }
    }

    #[test]
    fn running_cannot_skip_to_queued() {
        assert!(validate_transition(State::Running, State::Queued).is_err());
    }

    #[test]
    fn is_active_is_hold_queued_or_running() {
        assert!(State::Hold.is_active());
        assert!(State::Queued.is_active());
        assert!(State::Running.is_active());
        assert!(!State::Done.is_active());
        assert!(!State::Failed.is_active());
        assert!(!State::Canceled.is_active());
    }
}
