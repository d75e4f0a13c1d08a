// Copyright (c) 2025 - Cowboy AI, Inc.
//! VPN Connection Lifecycle State Machine
//!
//! # States
//!
//! - Requested: gateways declared, create call issued
//! - Created: create call returned an identifier
//! - DeletionRequested: teardown began, delete call issued
//! - Deleted: delete call succeeded (terminal)
//! - Failed: create or delete call errored (terminal)
//!
//! # Inputs
//!
//! - CreateSucceeded: Requested → Created, captures the identifier
//! - CreateFailed: Requested → Failed
//! - BeginTeardown: Created → DeletionRequested
//! - DeleteSucceeded: DeletionRequested → Deleted
//! - DeleteFailed: DeletionRequested → Failed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use super::{StateMachine, StateMachineWithHistory, Transition, TransitionError, TransitionResult};

/// Lifecycle state of the VPN connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Requested,
    Created,
    DeletionRequested,
    Deleted,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Requested => "Requested",
            ConnectionState::Created => "Created",
            ConnectionState::DeletionRequested => "DeletionRequested",
            ConnectionState::Deleted => "Deleted",
            ConnectionState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of an external call, fed to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleInput {
    CreateSucceeded { connection_id: String },
    CreateFailed { reason: String },
    BeginTeardown,
    DeleteSucceeded,
    DeleteFailed { reason: String },
}

/// Transition output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionOutput {
    /// Identifier captured by this transition
    pub captured_id: Option<String>,

    /// Failure reason, for transitions into `Failed`
    pub failure: Option<String>,
}

impl StateMachine for ConnectionState {
    type Input = LifecycleInput;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use ConnectionState::*;
        use LifecycleInput::*;

        match (self, input) {
            (Requested, CreateSucceeded { connection_id }) => Ok((
                Created,
                TransitionOutput {
                    captured_id: Some(connection_id.clone()),
                    failure: None,
                },
            )),
            (Requested, CreateFailed { reason }) | (DeletionRequested, DeleteFailed { reason }) => Ok((
                Failed,
                TransitionOutput {
                    captured_id: None,
                    failure: Some(reason.clone()),
                },
            )),
            (Created, BeginTeardown) => Ok((DeletionRequested, TransitionOutput::default())),
            (DeletionRequested, DeleteSucceeded) => Ok((Deleted, TransitionOutput::default())),

            (Deleted, _) | (Failed, _) => Err(TransitionError::Terminal(self.to_string())),

            (from, input) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                input: format!("{:?}", input),
            }),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Deleted | ConnectionState::Failed)
    }
}

/// State tracked for one VPN connection
///
/// `vpn_connection_id` is only ever set by a `CreateSucceeded` transition;
/// teardown replays that same value.
#[derive(Debug, Clone)]
pub struct VpnLifecycleRecord {
    customer_gateway_id: String,
    virtual_gateway_id: String,
    vpn_connection_id: Option<String>,
    failure: Option<String>,
    machine: StateMachineWithHistory<ConnectionState>,
}

impl VpnLifecycleRecord {
    /// Record for a create call just issued
    pub fn requested(customer_gateway_id: impl Into<String>, virtual_gateway_id: impl Into<String>) -> Self {
        Self {
            customer_gateway_id: customer_gateway_id.into(),
            virtual_gateway_id: virtual_gateway_id.into(),
            vpn_connection_id: None,
            failure: None,
            machine: StateMachineWithHistory::new(ConnectionState::Requested),
        }
    }

    /// Apply the outcome of an external call
    pub fn apply(&mut self, input: LifecycleInput, timestamp: DateTime<Utc>) -> TransitionResult<()> {
        let from = *self.machine.current_state();
        let output = self.machine.transition_with_history(input, timestamp)?;
        let to = *self.machine.current_state();

        if let Some(id) = output.captured_id {
            self.vpn_connection_id = Some(id);
        }
        if let Some(reason) = output.failure {
            warn!(from = %from, reason = %reason, "VPN connection lifecycle failed");
            self.failure = Some(reason);
        } else {
            info!(from = %from, to = %to, connection = ?self.vpn_connection_id, "VPN connection lifecycle");
        }
        Ok(())
    }

    pub fn customer_gateway_id(&self) -> &str {
        &self.customer_gateway_id
    }

    pub fn virtual_gateway_id(&self) -> &str {
        &self.virtual_gateway_id
    }

    /// Identifier captured from the create response
    pub fn vpn_connection_id(&self) -> Option<&str> {
        self.vpn_connection_id.as_deref()
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.machine.current_state()
    }

    /// Reason for the `Failed` state
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// States visited, starting with `Requested`
    pub fn states(&self) -> Vec<ConnectionState> {
        std::iter::once(ConnectionState::Requested)
            .chain(self.machine.history().iter().map(|t| t.to))
            .collect()
    }

    /// Full transition history
    pub fn history(&self) -> &[Transition<ConnectionState, LifecycleInput>] {
        self.machine.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn created() -> LifecycleInput {
        LifecycleInput::CreateSucceeded {
            connection_id: "vpn-0123".to_string(),
        }
    }

    #[test]
    fn test_requested_to_created_captures_id() {
        let (state, output) = ConnectionState::Requested.transition(&created()).unwrap();
        assert_eq!(state, ConnectionState::Created);
        assert_eq!(output.captured_id.as_deref(), Some("vpn-0123"));
    }

    #[test]
    fn test_create_failure_is_terminal() {
        let (state, output) = ConnectionState::Requested
            .transition(&LifecycleInput::CreateFailed {
                reason: "quota".to_string(),
            })
            .unwrap();
        assert_eq!(state, ConnectionState::Failed);
        assert_eq!(output.failure.as_deref(), Some("quota"));
        assert!(state.is_terminal());
        assert!(!state.can_transition(&LifecycleInput::BeginTeardown));
    }

    #[test]
    fn test_teardown_requires_created() {
        let result = ConnectionState::Requested.transition(&LifecycleInput::BeginTeardown);
        assert!(matches!(result, Err(TransitionError::InvalidTransition { .. })));

        let (state, _) = ConnectionState::Created
            .transition(&LifecycleInput::BeginTeardown)
            .unwrap();
        assert_eq!(state, ConnectionState::DeletionRequested);
    }

    #[test]
    fn test_delete_outcomes() {
        let (ok, _) = ConnectionState::DeletionRequested
            .transition(&LifecycleInput::DeleteSucceeded)
            .unwrap();
        assert_eq!(ok, ConnectionState::Deleted);

        let (failed, _) = ConnectionState::DeletionRequested
            .transition(&LifecycleInput::DeleteFailed {
                reason: "throttled".to_string(),
            })
            .unwrap();
        assert_eq!(failed, ConnectionState::Failed);
    }

    #[test]
    fn test_created_cannot_be_created_again() {
        assert!(!ConnectionState::Created.can_transition(&created()));
        assert!(!ConnectionState::Deleted.can_transition(&created()));
    }

    #[test]
    fn test_record_full_lifecycle() {
        let mut record = VpnLifecycleRecord::requested("cgw-1", "vgw-1");
        assert_eq!(record.state(), ConnectionState::Requested);
        assert_eq!(record.vpn_connection_id(), None);

        record.apply(created(), Utc::now()).unwrap();
        assert_eq!(record.vpn_connection_id(), Some("vpn-0123"));

        record.apply(LifecycleInput::BeginTeardown, Utc::now()).unwrap();
        record.apply(LifecycleInput::DeleteSucceeded, Utc::now()).unwrap();

        assert_eq!(
            record.states(),
            vec![
                ConnectionState::Requested,
                ConnectionState::Created,
                ConnectionState::DeletionRequested,
                ConnectionState::Deleted,
            ]
        );
        // Identifier survives teardown
        assert_eq!(record.vpn_connection_id(), Some("vpn-0123"));
        assert_eq!(record.customer_gateway_id(), "cgw-1");
        assert_eq!(record.virtual_gateway_id(), "vgw-1");
    }

    #[test]
    fn test_record_failure_reason() {
        let mut record = VpnLifecycleRecord::requested("cgw-1", "vgw-1");
        record
            .apply(
                LifecycleInput::CreateFailed {
                    reason: "InvalidCustomerGatewayID.NotFound".to_string(),
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(record.state(), ConnectionState::Failed);
        assert_eq!(record.failure(), Some("InvalidCustomerGatewayID.NotFound"));
        assert!(record.apply(LifecycleInput::BeginTeardown, Utc::now()).is_err());
    }
}
