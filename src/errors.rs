// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for topology planning, graph construction and provisioning

use thiserror::Error;

use crate::domain::NetworkError;
use crate::state_machine::TransitionError;

/// Errors that can occur while planning, declaring or provisioning the topology
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Missing/empty configuration field, malformed CIDR, bad zone count.
    /// Raised before any declaration is attempted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The declarative resource API rejected a resource
    #[error("Declaration of {resource} failed: {reason}")]
    ExternalDeclarationFailure { resource: String, reason: String },

    /// The create/delete call behind an external action node failed
    #[error("Lifecycle call {action} for {resource} failed: {reason}")]
    LifecycleCallFailure {
        resource: String,
        action: String,
        reason: String,
    },

    /// A declaration lacks an ordering edge it needs, or reads a value
    /// that has not been produced yet
    #[error("Ordering violation at {resource}: {reason}")]
    OrderingViolation { resource: String, reason: String },

    /// Lifecycle state machine refused a transition
    #[error("Lifecycle transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while loading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TopologyError {
    /// Shorthand for an `InvalidConfig` error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        TopologyError::InvalidConfig(message.into())
    }

    /// Shorthand for an `OrderingViolation`
    pub fn ordering(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        TopologyError::OrderingViolation {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an `ExternalDeclarationFailure`
    pub fn declaration(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        TopologyError::ExternalDeclarationFailure {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised before any side effect
    pub fn is_config_error(&self) -> bool {
        matches!(self, TopologyError::InvalidConfig(_))
    }
}

/// Result type for topology operations
pub type TopologyResult<T> = Result<T, TopologyError>;

impl From<NetworkError> for TopologyError {
    fn from(err: NetworkError) -> Self {
        TopologyError::InvalidConfig(err.to_string())
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(err: serde_json::Error) -> Self {
        TopologyError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for TopologyError {
    fn from(err: serde_yaml::Error) -> Self {
        TopologyError::InvalidConfig(format!("unreadable configuration document: {}", err))
    }
}
