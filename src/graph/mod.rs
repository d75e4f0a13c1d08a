// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarative Resource Graph
//!
//! The topology is emitted as a directed acyclic graph of typed nodes. The
//! external provisioning engine consumes it; nothing here provisions.
//!
//! # Edges
//!
//! ```text
//! Reference  added automatically when a node's properties embed another
//!            node's handle (Ref / Fn::GetAtt / Fn::Sub)
//! Explicit   added by hand with `add_dependency`; the VPN creation gate
//! ```
//!
//! A reference to a node that has not been declared yet is rejected at
//! declaration time, so data-dependency order needs no further bookkeeping.
//!
//! # Static Validation
//!
//! [`ResourceGraph::validate`] checks that the graph has a topological order
//! and that every node whose kind requires an action gate carries an
//! explicit edge to an external action node.

pub mod node;
pub mod reference;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::errors::{TopologyError, TopologyResult};
use crate::external::ExternalAction;
use crate::naming::logical_id;

/// Template parameter carrying the external action provider's ARN
pub const ACTION_PROVIDER_PARAMETER: &str = "ActionProviderServiceToken";

pub use node::{NodeId, NodeRef, NodeSpec, ResourceKind, ResourceNode, Unit};
pub use reference::{referenced_nodes, resolve, OutputRef};

/// Why an edge exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Dependent reads an output of the dependency
    Reference,
    /// Declared ordering constraint with no data flow
    Explicit,
}

/// `dependent` must be provisioned after `dependency`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub dependent: NodeId,
    pub dependency: NodeId,
    pub kind: EdgeKind,
}

/// Value republished for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackOutput {
    pub name: String,
    pub value: Value,
}

/// The resource dependency graph
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<NodeId, usize>,
    edges: BTreeSet<Edge>,
    outputs: Vec<StackOutput>,
}

impl ResourceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an ordinary resource
    ///
    /// Fails with `ExternalDeclarationFailure` on a duplicate identity and
    /// with `OrderingViolation` if the properties reference an undeclared node.
    pub fn declare(
        &mut self,
        unit: Unit,
        local: &str,
        kind: ResourceKind,
        properties: Value,
    ) -> TopologyResult<NodeRef> {
        let references = referenced_nodes(&properties);
        self.insert(unit, local, NodeSpec::Declared { kind, properties }, references)
    }

    /// Declare an external action node
    pub fn declare_action(
        &mut self,
        unit: Unit,
        local: &str,
        action: ExternalAction,
    ) -> TopologyResult<NodeRef> {
        let references = referenced_nodes(&action.to_properties());
        self.insert(unit, local, NodeSpec::Action(action), references)
    }

    fn insert(
        &mut self,
        unit: Unit,
        local: &str,
        spec: NodeSpec,
        references: BTreeSet<NodeId>,
    ) -> TopologyResult<NodeRef> {
        let id = NodeId::scoped(unit, local);

        if self.index.contains_key(&id) {
            return Err(TopologyError::declaration(
                id.as_str(),
                "duplicate declaration identity",
            ));
        }

        for target in &references {
            if !self.index.contains_key(target) {
                return Err(TopologyError::ordering(
                    id.as_str(),
                    format!("references undeclared node {}", target),
                ));
            }
        }

        let node = ResourceNode {
            id: id.clone(),
            unit,
            spec,
            tags: BTreeMap::new(),
        };
        let kind = node.kind();

        for target in references {
            self.edges.insert(Edge {
                dependent: id.clone(),
                dependency: target,
                kind: EdgeKind::Reference,
            });
        }

        debug!(node = %id, unit = %unit, kind = kind.type_name(), "declared");
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(node);

        Ok(NodeRef::new(id, kind))
    }

    /// Add an explicit ordering edge: `dependent` after `dependency`
    pub fn add_dependency(&mut self, dependent: &NodeRef, dependency: &NodeRef) -> TopologyResult<()> {
        for node in [dependent, dependency] {
            if !self.index.contains_key(node.id()) {
                return Err(TopologyError::ordering(
                    node.id().as_str(),
                    "dependency on undeclared node",
                ));
            }
        }
        if dependent.id() == dependency.id() {
            return Err(TopologyError::ordering(
                dependent.id().as_str(),
                "node cannot depend on itself",
            ));
        }

        debug!(dependent = %dependent.id(), dependency = %dependency.id(), "explicit dependency");
        self.edges.insert(Edge {
            dependent: dependent.id().clone(),
            dependency: dependency.id().clone(),
            kind: EdgeKind::Explicit,
        });
        Ok(())
    }

    /// Set a tag on one node
    ///
    /// Fails on an undeclared node or a kind the engine does not tag.
    pub fn tag(&mut self, node: &NodeRef, key: &str, value: &str) -> TopologyResult<()> {
        let position = *self
            .index
            .get(node.id())
            .ok_or_else(|| TopologyError::declaration(node.id().as_str(), "tag on undeclared node"))?;
        let target = &mut self.nodes[position];
        if !target.kind().is_taggable() {
            return Err(TopologyError::declaration(
                node.id().as_str(),
                format!("{} does not accept tags", target.kind().type_name()),
            ));
        }
        target.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Set a tag on every node that accepts tags, keeping existing values
    pub fn tag_all(&mut self, key: &str, value: &str) {
        for node in self.nodes.iter_mut().filter(|n| n.kind().is_taggable()) {
            node.tags
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    /// Publish an output; references must point at declared nodes
    pub fn add_output(&mut self, name: &str, value: Value) -> TopologyResult<()> {
        for target in referenced_nodes(&value) {
            if !self.index.contains_key(&target) {
                return Err(TopologyError::ordering(
                    name,
                    format!("output references undeclared node {}", target),
                ));
            }
        }
        self.outputs.push(StackOutput {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    /// Look up a node
    pub fn node(&self, id: &NodeId) -> Option<&ResourceNode> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    /// All nodes in declaration order
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Nodes of a kind, in declaration order
    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// All edges
    pub fn edges(&self) -> &BTreeSet<Edge> {
        &self.edges
    }

    /// Published outputs
    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    /// Edges leaving `id` (what it waits for)
    pub fn dependencies_of<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.dependent == id)
    }

    /// Whether `dependent` has an edge of `kind` to `dependency`
    pub fn has_edge(&self, dependent: &NodeId, dependency: &NodeId, kind: EdgeKind) -> bool {
        self.edges.contains(&Edge {
            dependent: dependent.clone(),
            dependency: dependency.clone(),
            kind,
        })
    }

    /// Dependency-respecting order, ties broken by declaration order
    ///
    /// Fails with `OrderingViolation` naming a node on a cycle.
    pub fn topological_order(&self) -> TopologyResult<Vec<NodeId>> {
        let mut pending: HashMap<&NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        let mut dependents: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();

        for node in &self.nodes {
            pending.insert(&node.id, 0);
        }
        // Reference and explicit edges between the same pair count once
        let pairs: BTreeSet<(&NodeId, &NodeId)> = self
            .edges
            .iter()
            .map(|e| (&e.dependent, &e.dependency))
            .collect();
        for (dependent, dependency) in pairs {
            *pending.entry(dependent).or_insert(0) += 1;
            dependents.entry(dependency).or_default().push(dependent);
        }

        // Ready set keyed by declaration position for a deterministic order
        let mut ready: BTreeSet<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| pending.get(&n.id) == Some(&0))
            .map(|(position, _)| position)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(position) = ready.pop_first() {
            let id = &self.nodes[position].id;
            order.push(id.clone());

            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(self.index[*dependent]);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .find(|n| pending.get(&n.id).is_some_and(|count| *count > 0))
                .map(|n| n.id.as_str().to_string())
                .unwrap_or_default();
            return Err(TopologyError::ordering(stuck, "dependency cycle"));
        }

        Ok(order)
    }

    /// Static validation of the graph
    ///
    /// # Rules
    /// - A topological order exists
    /// - Every gated node has an explicit edge to an external action node
    pub fn validate(&self) -> TopologyResult<()> {
        self.topological_order()?;

        let mut gated = 0usize;
        for node in self.nodes.iter().filter(|n| n.kind().requires_action_gate()) {
            let has_gate = self.dependencies_of(&node.id).any(|edge| {
                edge.kind == EdgeKind::Explicit
                    && self.node(&edge.dependency).is_some_and(ResourceNode::is_action)
            });
            if !has_gate {
                return Err(TopologyError::ordering(
                    node.id.as_str(),
                    "not gated on an external action",
                ));
            }
            gated += 1;
        }

        info!(nodes = self.nodes.len(), edges = self.edges.len(), gated, "graph validated");
        Ok(())
    }

    /// Render as an engine template
    ///
    /// External action nodes render as `Custom::AWS` resources whose
    /// `ServiceToken` is the [`ACTION_PROVIDER_PARAMETER`] template parameter:
    /// the deployer supplies the ARN of the function that performs the
    /// create/delete calls, and attaches the rendered `Policy` to its role.
    pub fn to_template(&self, description: &str) -> Value {
        let mut resources = Map::new();
        let mut has_actions = false;
        for node in &self.nodes {
            let mut body = Map::new();
            body.insert("Type".to_string(), json!(node.kind().type_name()));
            let mut properties = node.rendered_properties();
            if node.is_action() {
                has_actions = true;
                if let Value::Object(map) = &mut properties {
                    map.insert(
                        "ServiceToken".to_string(),
                        json!({ "Ref": ACTION_PROVIDER_PARAMETER }),
                    );
                }
            }
            body.insert("Properties".to_string(), properties);

            let explicit: Vec<&str> = self
                .dependencies_of(&node.id)
                .filter(|e| e.kind == EdgeKind::Explicit)
                .map(|e| e.dependency.as_str())
                .collect();
            if !explicit.is_empty() {
                body.insert("DependsOn".to_string(), json!(explicit));
            }
            if node.is_action() {
                body.insert("DeletionPolicy".to_string(), json!("Delete"));
            }
            resources.insert(node.id.as_str().to_string(), Value::Object(body));
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            outputs.insert(
                logical_id(&output.name),
                json!({ "Description": output.name, "Value": output.value }),
            );
        }

        let mut template = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": description,
            "Resources": resources,
            "Outputs": outputs,
        });
        if has_actions {
            template["Parameters"] = json!({
                ACTION_PROVIDER_PARAMETER: {
                    "Type": "String",
                    "Description": "ARN of the function that performs external action calls",
                }
            });
        }
        template
    }
}
