use std::fmt;

use thiserror::Error;

/// Lifecycle of one logical response.
///
/// ```text
/// Idle -> Producing -> (Streaming | BatchFallback) -> Finalizing -> Done
///           any non-terminal state -> Errored
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Producing,
    Streaming,
    BatchFallback,
    Finalizing,
    Done,
    Errored,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Done | StreamState::Errored)
    }

    pub fn can_transition_to(self, next: StreamState) -> bool {
        use StreamState::*;

        match (self, next) {
            (Idle, Producing)
            | (Producing, Streaming)
            | (Producing, BatchFallback)
            | (Streaming, Finalizing)
            | (BatchFallback, Finalizing)
            | (Finalizing, Done) => true,
            (from, Errored) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid stream transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: StreamState,
    pub to: StreamState,
}

/// The state of a single response; never reused across responses
#[derive(Debug)]
pub struct StateMachine {
    state: StreamState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn advance(&mut self, next: StreamState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(from = %self.state, to = %next, "stream state");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StreamState::*;

    #[test]
    fn test_happy_paths() {
        for middle in [Streaming, BatchFallback] {
            let mut machine = StateMachine::new();
            for next in [Producing, middle, Finalizing, Done] {
                machine.advance(next).unwrap();
            }
            assert!(machine.state().is_terminal());
        }
    }

    #[test]
    fn test_errored_reachable_until_terminal() {
        for from in [Idle, Producing, Streaming, BatchFallback, Finalizing] {
            assert!(from.can_transition_to(Errored));
        }
        assert!(!Done.can_transition_to(Errored));
        assert!(!Errored.can_transition_to(Errored));
    }

    #[test]
    fn test_no_skipping_or_reentry() {
        let mut machine = StateMachine::new();
        assert_eq!(
            machine.advance(Streaming),
            Err(InvalidTransition { from: Idle, to: Streaming })
        );

        machine.advance(Producing).unwrap();
        machine.advance(Errored).unwrap();
        assert!(machine.advance(Producing).is_err());
        assert!(!Streaming.can_transition_to(BatchFallback));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err: Box<dyn std::error::Error> = Box::new(InvalidTransition {
            from: Done,
            to: Producing,
        });
        assert_eq!(err.to_string(), "invalid stream transition Done -> Producing");
    }
}
