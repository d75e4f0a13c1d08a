// Copyright (c) 2025 - Cowboy AI, Inc.
//! External Resource Actions
//!
//! Some resources cannot be declared statically: their identifier only exists
//! once an imperative API call has returned. Such a resource is modelled as an
//! [`ExternalAction`]: a create call, an optional compensating delete call, and
//! the narrowed permission scope both calls run under.
//!
//! # Identifier Capture
//!
//! ```text
//! on_create ──invoke──> response ──PhysicalResourceId::FromResponse(path)──> id
//!                                                                             │
//! on_delete { "VpnConnectionId": PHYSICAL:RESOURCEID: } <──── replayed ───────┘
//! ```
//!
//! The delete call never re-derives the identifier; it replays the one
//! captured at creation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::DeploymentEnv;
use crate::graph::NodeRef;

/// Placeholder replaced by the captured physical resource id
pub const PHYSICAL_RESOURCE_ID_REFERENCE: &str = "PHYSICAL:RESOURCEID:";

/// Value to place in delete parameters where the captured id belongs
pub fn physical_resource_id_reference() -> Value {
    Value::String(PHYSICAL_RESOURCE_ID_REFERENCE.to_string())
}

/// Where the physical resource id of an action comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalResourceId {
    /// Dotted path into the create response
    FromResponse(String),
    /// Fixed value
    Literal(String),
}

impl PhysicalResourceId {
    /// Extract the id from a create response
    pub fn resolve(&self, response: &Value) -> Option<String> {
        match self {
            PhysicalResourceId::FromResponse(path) => response_path(response, path),
            PhysicalResourceId::Literal(id) => Some(id.clone()),
        }
    }
}

/// Read a dotted path (`VpnConnection.VpnConnectionId`) as a string
pub fn response_path(response: &Value, path: &str) -> Option<String> {
    let mut current = response;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// One call against a provider service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkCall {
    pub service: String,
    pub action: String,
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<PhysicalResourceId>,
}

impl SdkCall {
    /// Create a call with parameters
    pub fn new(service: &str, action: &str, parameters: Value) -> Self {
        Self {
            service: service.to_string(),
            action: action.to_string(),
            parameters,
            output_paths: Vec::new(),
            physical_resource_id: None,
        }
    }

    /// Response fields exposed as node attributes
    pub fn with_output_paths(mut self, paths: &[&str]) -> Self {
        self.output_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Source of the physical resource id
    pub fn with_physical_resource_id(mut self, id: PhysicalResourceId) -> Self {
        self.physical_resource_id = Some(id);
        self
    }

    /// Permission name for this call (`ec2:CreateVpnConnection`)
    pub fn iam_action(&self) -> String {
        let mut chars = self.action.chars();
        let action = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };
        format!("{}:{}", self.service.to_lowercase(), action)
    }

    /// Copy of this call with the physical id placeholder replaced
    pub fn with_physical_id(&self, physical_id: &str) -> Self {
        let mut call = self.clone();
        call.parameters = substitute(&self.parameters, physical_id);
        call
    }

    /// Whether the parameters still carry the placeholder
    pub fn references_physical_id(&self) -> bool {
        contains_placeholder(&self.parameters)
    }
}

fn substitute(value: &Value, physical_id: &str) -> Value {
    match value {
        Value::String(text) if text == PHYSICAL_RESOURCE_ID_REFERENCE => {
            Value::String(physical_id.to_string())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, physical_id)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, physical_id)).collect()),
        other => other.clone(),
    }
}

fn contains_placeholder(value: &Value) -> bool {
    match value {
        Value::String(text) => text == PHYSICAL_RESOURCE_ID_REFERENCE,
        Value::Object(map) => map.values().any(contains_placeholder),
        Value::Array(items) => items.iter().any(contains_placeholder),
        _ => false,
    }
}

/// Permissions the action runs under
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    /// Allow exactly the calls' actions on exactly `resources`
    pub fn from_sdk_calls(calls: &[&SdkCall], resources: Vec<Value>) -> Self {
        let mut actions: Vec<String> = calls.iter().map(|c| c.iam_action()).collect();
        actions.dedup();
        Self { actions, resources }
    }
}

/// A resource backed by an imperative create/delete pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAction {
    pub on_create: SdkCall,
    pub on_delete: Option<SdkCall>,
    pub policy: PolicyStatement,
}

impl ExternalAction {
    /// Create an action
    pub fn new(on_create: SdkCall, on_delete: Option<SdkCall>, policy: PolicyStatement) -> Self {
        Self {
            on_create,
            on_delete,
            policy,
        }
    }

    /// Properties as rendered for the engine
    pub fn to_properties(&self) -> Value {
        json!({
            "Create": self.on_create,
            "Delete": self.on_delete,
            "Policy": {
                "Effect": "Allow",
                "Action": self.policy.actions,
                "Resource": self.policy.resources,
            },
        })
    }

    /// A field of the create response, readable by dependents once the
    /// create call has returned
    pub fn response_field(node: &NodeRef, path: &str) -> Value {
        node.attribute(path)
    }
}

/// ARN of a resource in the target account and region
///
/// Account and region come from `env`, falling back to the engine's pseudo
/// parameters. `resource_name` may be a literal or a node reference.
pub fn format_arn(env: &DeploymentEnv, service: &str, resource: &str, resource_name: Value) -> Value {
    json!({
        "Fn::Join": ["", [
            "arn:",
            { "Ref": "AWS::Partition" },
            format!(":{}:", service),
            env.region_value(),
            ":",
            env.account_value(),
            format!(":{}/", resource),
            resource_name,
        ]]
    })
}

/// Errors returned by the provider APIs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The provider refused the request
    #[error("Rejected: {0}")]
    Rejected(String),

    /// No response in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Provider not reachable
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Imperative provider API used by external action nodes
///
/// `invoke` returns the raw response document; the caller extracts the
/// physical id and output paths from it.
#[async_trait]
pub trait ResourceActionApi: Send + Sync {
    /// Perform one call
    async fn invoke(&self, call: &SdkCall) -> Result<Value, ApiError>;
}
