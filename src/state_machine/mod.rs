// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Lifecycles of externally managed resources are modelled as pure Mealy
//! machines: a transition maps `(State, Input)` to `(State, Output)` with no
//! side effects. The caller performs the I/O and feeds the outcome back in.
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! [`StateMachineWithHistory`] wraps a machine and records each transition
//! with its timestamp, so a lifecycle record can show how it got where it is.

pub mod vpn_lifecycle;

pub use vpn_lifecycle::{ConnectionState, LifecycleInput, TransitionOutput, VpnLifecycleRecord};

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition from current state to target state is not allowed
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// Current state is terminal
    #[error("State {0} is terminal")]
    Terminal(String),
}

/// Trait for finite state machines
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Whether no input leaves this state
    fn is_terminal(&self) -> bool;
}

/// Transition metadata
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    /// State before transition
    pub from: S,

    /// State after transition
    pub to: S,

    /// Input that triggered transition
    pub input: I,

    /// Timestamp of transition
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<S, I> Transition<S, I> {
    /// Create a new transition record
    pub fn new(from: S, to: S, input: I, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            from,
            to,
            input,
            timestamp,
        }
    }
}

/// State machine with history
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    current: FSM,
    history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    /// Start tracking from `initial`
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Transition and record it; the state is unchanged on error
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> TransitionResult<FSM::Output>
    where
        FSM::Input: Clone,
    {
        let from = self.current.clone();
        let (to, output) = self.current.transition(&input)?;

        self.history
            .push(Transition::new(from, to.clone(), input, timestamp));

        self.current = to;
        Ok(output)
    }

    /// Transition history, oldest first
    pub fn history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    /// Current state
    pub fn current_state(&self) -> &FSM {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Gate {
        Closed,
        Open,
        Welded,
    }

    #[derive(Debug, Clone)]
    enum GateInput {
        Toggle,
        Weld,
    }

    impl StateMachine for Gate {
        type Input = GateInput;
        type Output = ();

        fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
            match (self, input) {
                (Gate::Closed, GateInput::Toggle) => Ok((Gate::Open, ())),
                (Gate::Open, GateInput::Toggle) => Ok((Gate::Closed, ())),
                (Gate::Closed, GateInput::Weld) => Ok((Gate::Welded, ())),
                (Gate::Welded, _) => Err(TransitionError::Terminal("Welded".to_string())),
                (from, input) => Err(TransitionError::InvalidTransition {
                    from: format!("{:?}", from),
                    input: format!("{:?}", input),
                }),
            }
        }

        fn is_terminal(&self) -> bool {
            matches!(self, Gate::Welded)
        }
    }

    #[test]
    fn test_history_records_transitions() {
        let mut fsm = StateMachineWithHistory::new(Gate::Closed);

        fsm.transition_with_history(GateInput::Toggle, Utc::now()).unwrap();
        fsm.transition_with_history(GateInput::Toggle, Utc::now()).unwrap();
        fsm.transition_with_history(GateInput::Weld, Utc::now()).unwrap();

        assert_eq!(*fsm.current_state(), Gate::Welded);
        assert_eq!(fsm.history().len(), 3);
        assert_eq!(fsm.history()[0].from, Gate::Closed);
        assert_eq!(fsm.history()[0].to, Gate::Open);
    }

    #[test]
    fn test_failed_transition_leaves_state() {
        let mut fsm = StateMachineWithHistory::new(Gate::Open);
        assert!(fsm.transition_with_history(GateInput::Weld, Utc::now()).is_err());
        assert_eq!(*fsm.current_state(), Gate::Open);
        assert!(fsm.history().is_empty());
    }

    #[test]
    fn test_terminal() {
        assert!(Gate::Welded.is_terminal());
        assert!(!Gate::Welded.can_transition(&GateInput::Toggle));
        assert!(Gate::Closed.can_transition(&GateInput::Weld));
    }
}
