// Copyright (c) 2025 - Cowboy AI, Inc.
//! Graph node types
//!
//! A node is either an ordinary declarative resource (properties only) or an
//! external action whose identifier only exists once an imperative call has
//! returned.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::external::ExternalAction;
use crate::naming::logical_id;

/// Deployable unit that owns a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Top-level composer
    Root,
    /// Cloud-side network unit
    CloudSide,
    /// On-premise-simulating network unit
    OnPremSide,
    /// VPN interconnect unit
    Vpn,
}

impl Unit {
    /// Scope prefix used in node identities
    pub fn scope(&self) -> &'static str {
        match self {
            Unit::Root => "",
            Unit::CloudSide => "AwsSideStack",
            Unit::OnPremSide => "OnPremiseSideStack",
            Unit::Vpn => "VpnStack",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Root => write!(f, "root"),
            other => write!(f, "{}", other.scope()),
        }
    }
}

/// Unique identity of a declaration (an engine logical id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Identity of `local` inside `unit`
    pub fn scoped(unit: Unit, local: &str) -> Self {
        Self(logical_id(&format!("{}/{}", unit.scope(), local)))
    }

    /// Wrap an already-rendered logical id
    pub fn from_logical(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The logical id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of resource a node declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    RouteTable,
    SubnetRouteTableAssociation,
    InternetGateway,
    VpcGatewayAttachment,
    Route,
    SecurityGroup,
    SecurityGroupIngress,
    IamRole,
    InstanceProfile,
    Instance,
    VpcEndpoint,
    CustomerGateway,
    VpnGateway,
    VpnConnectionRoute,
    VpnGatewayRoutePropagation,
    /// Imperative create/delete call pair (custom resource)
    ExternalAction,
}

impl ResourceKind {
    /// Engine type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "AWS::EC2::VPC",
            ResourceKind::Subnet => "AWS::EC2::Subnet",
            ResourceKind::RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::Route => "AWS::EC2::Route",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            ResourceKind::IamRole => "AWS::IAM::Role",
            ResourceKind::InstanceProfile => "AWS::IAM::InstanceProfile",
            ResourceKind::Instance => "AWS::EC2::Instance",
            ResourceKind::VpcEndpoint => "AWS::EC2::VPCEndpoint",
            ResourceKind::CustomerGateway => "AWS::EC2::CustomerGateway",
            ResourceKind::VpnGateway => "AWS::EC2::VPNGateway",
            ResourceKind::VpnConnectionRoute => "AWS::EC2::VPNConnectionRoute",
            ResourceKind::VpnGatewayRoutePropagation => "AWS::EC2::VPNGatewayRoutePropagation",
            ResourceKind::ExternalAction => "Custom::AWS",
        }
    }

    /// Whether the engine accepts a `Tags` list on this kind
    pub fn is_taggable(&self) -> bool {
        matches!(
            self,
            ResourceKind::Vpc
                | ResourceKind::Subnet
                | ResourceKind::RouteTable
                | ResourceKind::InternetGateway
                | ResourceKind::SecurityGroup
                | ResourceKind::IamRole
                | ResourceKind::Instance
                | ResourceKind::VpcEndpoint
                | ResourceKind::CustomerGateway
                | ResourceKind::VpnGateway
        )
    }

    /// Kinds that are only valid once an external action has completed.
    ///
    /// Each node of such a kind must carry an explicit edge to an
    /// [`ResourceKind::ExternalAction`] node.
    pub fn requires_action_gate(&self) -> bool {
        matches!(self, ResourceKind::VpnGatewayRoutePropagation)
    }
}

/// What a node declares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodeSpec {
    /// Ordinary declarative resource
    Declared {
        kind: ResourceKind,
        properties: Value,
    },
    /// External action with create/delete payloads
    Action(ExternalAction),
}

/// A declaration in the resource graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: NodeId,
    pub unit: Unit,
    pub spec: NodeSpec,
    pub tags: BTreeMap<String, String>,
}

impl ResourceNode {
    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        match &self.spec {
            NodeSpec::Declared { kind, .. } => *kind,
            NodeSpec::Action(_) => ResourceKind::ExternalAction,
        }
    }

    /// Whether this is an external action node
    pub fn is_action(&self) -> bool {
        matches!(self.spec, NodeSpec::Action(_))
    }

    /// Properties as rendered for the engine, tags included
    pub fn rendered_properties(&self) -> Value {
        let mut properties = match &self.spec {
            NodeSpec::Declared { properties, .. } => properties.clone(),
            NodeSpec::Action(action) => action.to_properties(),
        };

        if !self.tags.is_empty() && self.kind().is_taggable() {
            let tags: Vec<Value> = self
                .tags
                .iter()
                .map(|(key, value)| json!({ "Key": key, "Value": value }))
                .collect();
            if let Value::Object(map) = &mut properties {
                map.insert("Tags".to_string(), Value::Array(tags));
            }
        }

        properties
    }
}

/// Handle to a declared node
///
/// The only way to read another node's outputs. Embedding a handle's
/// reference in a property makes the graph add an ordering edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    id: NodeId,
    kind: ResourceKind,
}

impl NodeRef {
    pub(crate) fn new(id: NodeId, kind: ResourceKind) -> Self {
        Self { id, kind }
    }

    /// Identity of the referenced node
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Kind of the referenced node
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The node's primary identifier (`Ref`)
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.id.as_str() })
    }

    /// One of the node's output attributes (`Fn::GetAtt`)
    pub fn attribute(&self, name: &str) -> Value {
        json!({ "Fn::GetAtt": [self.id.as_str(), name] })
    }
}
