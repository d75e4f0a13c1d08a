// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dependency Graph Executor
//!
//! Walks a validated [`ResourceGraph`] in topological order and drives the
//! two provider collaborators: the declarative resource API for ordinary
//! nodes and the resource-action API for external action nodes.
//!
//! # Architecture
//!
//! ```text
//! ResourceGraph            GraphExecutor                   Collaborators
//! ─────────────            ─────────────                   ─────────────
//!
//! topological order ──>  resolve Ref / GetAtt / Sub  ──>  ResourceApi::create
//!                        against produced values
//!                               │
//!                  action node? ┴──> invoke on_create ──>  ResourceActionApi
//!                                    capture physical id
//!                                    VpnLifecycleRecord: Requested → Created
//! ```
//!
//! A reference is only resolved once its target has produced a value. An
//! external action produces nothing until its create call has returned, so
//! every dependent waits for the response. Teardown runs in reverse order and
//! replays the captured identifier into the compensating delete call.
//!
//! Failures are fatal: the executor stops at the first failing node and
//! leaves recovery to the caller.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{TopologyError, TopologyResult};
use crate::external::{response_path, ApiError, ExternalAction, PhysicalResourceId, ResourceActionApi, SdkCall};
use crate::graph::{resolve, EdgeKind, NodeId, NodeSpec, OutputRef, ResourceGraph, ResourceKind, ResourceNode};
use crate::state_machine::{ConnectionState, LifecycleInput, VpnLifecycleRecord};

/// A node with every reference replaced by a produced value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedResource {
    pub id: NodeId,
    pub kind: ResourceKind,
    pub properties: Value,
}

/// What the provider returned for a created resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedResource {
    pub physical_id: String,
    pub attributes: BTreeMap<String, String>,
}

/// Declarative resource API
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Create one resource
    async fn create(&self, resource: &ResolvedResource) -> Result<ProvisionedResource, ApiError>;

    /// Delete a resource created earlier
    async fn delete(&self, resource: &ResolvedResource, physical_id: &str) -> Result<(), ApiError>;
}

/// Result of an apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub run_id: Uuid,
    /// Nodes in the order they were created
    pub created: Vec<NodeId>,
    /// Published outputs with node references resolved
    pub outputs: BTreeMap<String, Value>,
}

/// Executes a resource graph against provider collaborators
pub struct GraphExecutor<R, A> {
    resources: R,
    actions: A,
    run_id: Uuid,
    provisioned: HashMap<NodeId, ProvisionedResource>,
    resolved: HashMap<NodeId, ResolvedResource>,
    lifecycles: BTreeMap<NodeId, VpnLifecycleRecord>,
    created: Vec<NodeId>,
}

impl<R: ResourceApi, A: ResourceActionApi> GraphExecutor<R, A> {
    /// Create an executor for one provisioning run
    pub fn new(resources: R, actions: A) -> Self {
        Self {
            resources,
            actions,
            run_id: Uuid::now_v7(),
            provisioned: HashMap::new(),
            resolved: HashMap::new(),
            lifecycles: BTreeMap::new(),
            created: Vec::new(),
        }
    }

    /// Identifier of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Lifecycle record of an external action node
    pub fn lifecycle(&self, id: &NodeId) -> Option<&VpnLifecycleRecord> {
        self.lifecycles.get(id)
    }

    /// All lifecycle records, keyed by action node
    pub fn lifecycles(&self) -> &BTreeMap<NodeId, VpnLifecycleRecord> {
        &self.lifecycles
    }

    /// What the provider returned for a node
    pub fn provisioned(&self, id: &NodeId) -> Option<&ProvisionedResource> {
        self.provisioned.get(id)
    }

    /// Nodes currently created, in creation order
    pub fn created(&self) -> &[NodeId] {
        &self.created
    }

    /// Resource-API collaborator
    pub fn resource_api(&self) -> &R {
        &self.resources
    }

    /// Resource-action-API collaborator
    pub fn action_api(&self) -> &A {
        &self.actions
    }

    fn lookup(&self, target: &OutputRef) -> Option<String> {
        let produced = self.provisioned.get(&target.node)?;
        match &target.attribute {
            None => Some(produced.physical_id.clone()),
            Some(attribute) => produced.attributes.get(attribute).cloned(),
        }
    }

    fn resolve_value(&self, id: &NodeId, value: &Value) -> TopologyResult<Value> {
        resolve(value, &|target: &OutputRef| self.lookup(target)).map_err(|missing| {
            let what = match &missing.attribute {
                Some(attribute) => format!("{}.{}", missing.node, attribute),
                None => missing.node.to_string(),
            };
            TopologyError::ordering(id.as_str(), format!("reads {} before it has a value", what))
        })
    }

    /// Every explicit action dependency must have reached `Created`
    fn check_gates(&self, graph: &ResourceGraph, node: &ResourceNode) -> TopologyResult<()> {
        for edge in graph.dependencies_of(&node.id).filter(|e| e.kind == EdgeKind::Explicit) {
            let is_action = graph.node(&edge.dependency).is_some_and(ResourceNode::is_action);
            if !is_action {
                continue;
            }
            let state = self.lifecycles.get(&edge.dependency).map(VpnLifecycleRecord::state);
            if state != Some(ConnectionState::Created) {
                return Err(TopologyError::ordering(
                    node.id.as_str(),
                    format!("gate {} has not reached Created", edge.dependency),
                ));
            }
        }
        Ok(())
    }

    /// Create every node of `graph` in dependency order
    pub async fn apply(&mut self, graph: &ResourceGraph) -> TopologyResult<ApplyReport> {
        graph.validate()?;
        let order = graph.topological_order()?;
        info!(run_id = %self.run_id, nodes = order.len(), "apply started");

        for id in &order {
            let node = graph
                .node(id)
                .ok_or_else(|| TopologyError::ordering(id.as_str(), "node missing from graph"))?;
            self.check_gates(graph, node)?;

            match &node.spec {
                NodeSpec::Declared { .. } => self.create_declared(node).await?,
                NodeSpec::Action(action) => self.create_action(node, action).await?,
            }
            self.created.push(id.clone());
        }

        let mut outputs = BTreeMap::new();
        for output in graph.outputs() {
            let id = NodeId::from_logical(output.name.clone());
            outputs.insert(output.name.clone(), self.resolve_value(&id, &output.value)?);
        }

        info!(run_id = %self.run_id, created = self.created.len(), "apply finished");
        Ok(ApplyReport {
            run_id: self.run_id,
            created: self.created.clone(),
            outputs,
        })
    }

    async fn create_declared(&mut self, node: &ResourceNode) -> TopologyResult<()> {
        let resource = ResolvedResource {
            id: node.id.clone(),
            kind: node.kind(),
            properties: self.resolve_value(&node.id, &node.rendered_properties())?,
        };

        let produced = self.resources.create(&resource).await.map_err(|err| {
            error!(run_id = %self.run_id, node = %node.id, error = %err, "declaration rejected");
            TopologyError::declaration(node.id.as_str(), err.to_string())
        })?;
        debug!(node = %node.id, physical_id = %produced.physical_id, "created");

        self.provisioned.insert(node.id.clone(), produced);
        self.resolved.insert(node.id.clone(), resource);
        Ok(())
    }

    async fn create_action(&mut self, node: &ResourceNode, action: &ExternalAction) -> TopologyResult<()> {
        let mut call = action.on_create.clone();
        call.parameters = self.resolve_value(&node.id, &action.on_create.parameters)?;

        let parameter = |key: &str| {
            call.parameters
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let mut record = VpnLifecycleRecord::requested(parameter("CustomerGatewayId"), parameter("VpnGatewayId"));
        info!(run_id = %self.run_id, node = %node.id, action = %call.action, "external action invoked");

        let outcome = match self.actions.invoke(&call).await {
            Ok(response) => capture(&call, &response),
            Err(err) => Err(err.to_string()),
        };

        match outcome {
            Ok(produced) => {
                record.apply(
                    LifecycleInput::CreateSucceeded {
                        connection_id: produced.physical_id.clone(),
                    },
                    Utc::now(),
                )?;
                info!(node = %node.id, physical_id = %produced.physical_id, "physical id captured");
                self.lifecycles.insert(node.id.clone(), record);
                self.provisioned.insert(node.id.clone(), produced);
                self.resolved.insert(
                    node.id.clone(),
                    ResolvedResource {
                        id: node.id.clone(),
                        kind: ResourceKind::ExternalAction,
                        properties: call.parameters,
                    },
                );
                Ok(())
            }
            Err(reason) => {
                record.apply(LifecycleInput::CreateFailed { reason: reason.clone() }, Utc::now())?;
                self.lifecycles.insert(node.id.clone(), record);
                Err(TopologyError::LifecycleCallFailure {
                    resource: node.id.to_string(),
                    action: call.action,
                    reason,
                })
            }
        }
    }

    /// Delete everything this executor created, newest first
    pub async fn teardown(&mut self, graph: &ResourceGraph) -> TopologyResult<()> {
        info!(run_id = %self.run_id, nodes = self.created.len(), "teardown started");

        while let Some(id) = self.created.last().cloned() {
            let node = graph
                .node(&id)
                .ok_or_else(|| TopologyError::ordering(id.as_str(), "node missing from graph"))?;

            match &node.spec {
                NodeSpec::Declared { .. } => self.delete_declared(&id).await?,
                NodeSpec::Action(action) => self.delete_action(&id, action).await?,
            }

            self.created.pop();
            self.provisioned.remove(&id);
            self.resolved.remove(&id);
        }

        info!(run_id = %self.run_id, "teardown finished");
        Ok(())
    }

    async fn delete_declared(&mut self, id: &NodeId) -> TopologyResult<()> {
        let (Some(resource), Some(produced)) = (self.resolved.get(id), self.provisioned.get(id)) else {
            return Err(TopologyError::ordering(id.as_str(), "deleting a node that was never created"));
        };
        self.resources
            .delete(resource, &produced.physical_id)
            .await
            .map_err(|err| TopologyError::declaration(id.as_str(), err.to_string()))?;
        debug!(node = %id, physical_id = %produced.physical_id, "deleted");
        Ok(())
    }

    async fn delete_action(&mut self, id: &NodeId, action: &ExternalAction) -> TopologyResult<()> {
        let record = self
            .lifecycles
            .get_mut(id)
            .ok_or_else(|| TopologyError::ordering(id.as_str(), "no lifecycle record"))?;
        record.apply(LifecycleInput::BeginTeardown, Utc::now())?;

        let Some(on_delete) = &action.on_delete else {
            record.apply(LifecycleInput::DeleteSucceeded, Utc::now())?;
            return Ok(());
        };

        // Replay the identifier captured at creation
        let physical_id = record.vpn_connection_id().unwrap_or_default().to_string();
        let mut call = on_delete.with_physical_id(&physical_id);
        let parameters = call.parameters.clone();
        call.parameters = self.resolve_value(id, &parameters)?;

        let outcome = self.actions.invoke(&call).await;
        let record = self
            .lifecycles
            .get_mut(id)
            .ok_or_else(|| TopologyError::ordering(id.as_str(), "no lifecycle record"))?;
        match outcome {
            Ok(_) => {
                record.apply(LifecycleInput::DeleteSucceeded, Utc::now())?;
                Ok(())
            }
            Err(err) => {
                warn!(node = %id, physical_id = %physical_id, error = %err, "compensating delete failed");
                record.apply(
                    LifecycleInput::DeleteFailed {
                        reason: err.to_string(),
                    },
                    Utc::now(),
                )?;
                Err(TopologyError::LifecycleCallFailure {
                    resource: id.to_string(),
                    action: call.action,
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Physical id and output paths of a create response
fn capture(call: &SdkCall, response: &Value) -> Result<ProvisionedResource, String> {
    let physical_id = match &call.physical_resource_id {
        Some(source) => source.resolve(response),
        None => None,
    }
    .ok_or_else(|| format!("{} response carries no physical resource id", call.action))?;

    let attributes = call
        .output_paths
        .iter()
        .filter_map(|path| response_path(response, path).map(|value| (path.clone(), value)))
        .collect();

    Ok(ProvisionedResource {
        physical_id,
        attributes,
    })
}

/// One call seen by [`DryRunApi`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RecordedCall {
    Create { id: NodeId, physical_id: String },
    Delete { id: NodeId, physical_id: String },
    Invoke { action: String, parameters: Value },
}

/// Provider stand-in that fabricates identifiers and records every call
///
/// Nothing is provisioned. Useful for rehearsing a run and for tests.
#[derive(Debug, Default)]
pub struct DryRunApi {
    sequence: AtomicU32,
    calls: Mutex<Vec<RecordedCall>>,
}

impl DryRunApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls seen so far
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    fn next(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn prefix(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::RouteTable => "rtb",
            ResourceKind::SubnetRouteTableAssociation => "rtbassoc",
            ResourceKind::InternetGateway => "igw",
            ResourceKind::SecurityGroup => "sg",
            ResourceKind::SecurityGroupIngress => "sgr",
            ResourceKind::Instance => "i",
            ResourceKind::VpcEndpoint => "vpce",
            ResourceKind::CustomerGateway => "cgw",
            ResourceKind::VpnGateway => "vgw",
            ResourceKind::IamRole => "role",
            ResourceKind::InstanceProfile => "profile",
            ResourceKind::VpcGatewayAttachment
            | ResourceKind::Route
            | ResourceKind::VpnConnectionRoute
            | ResourceKind::VpnGatewayRoutePropagation
            | ResourceKind::ExternalAction => "res",
        }
    }

    fn attributes(resource: &ResolvedResource, physical_id: &str, sequence: u32) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        let text = |key: &str| resource.properties.get(key).and_then(Value::as_str).map(str::to_string);
        match resource.kind {
            ResourceKind::Vpc => {
                if let Some(cidr) = text("CidrBlock") {
                    attributes.insert("CidrBlock".to_string(), cidr);
                }
            }
            ResourceKind::Subnet => {
                let zone = text("AvailabilityZone").unwrap_or_else(|| "dry-run-zone".to_string());
                attributes.insert("AvailabilityZone".to_string(), zone);
            }
            ResourceKind::SecurityGroup => {
                attributes.insert("GroupId".to_string(), physical_id.to_string());
            }
            ResourceKind::IamRole | ResourceKind::InstanceProfile => {
                attributes.insert("Arn".to_string(), format!("arn:aws:iam::000000000000:{}", physical_id));
            }
            ResourceKind::Instance => {
                let (high, low) = ((sequence >> 8) & 0xff, sequence & 0xff);
                attributes.insert("PrivateIp".to_string(), format!("10.255.{}.{}", high, low));
                attributes.insert("PublicIp".to_string(), format!("203.0.113.{}", low));
            }
            _ => {}
        }
        attributes
    }
}

/// Write `value` at a dotted path, creating objects on the way
fn set_path(document: &mut Value, path: &str, value: Value) {
    let mut current = document;
    for segment in path.split('.') {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else { return };
        current = map.entry(segment.to_string()).or_insert(Value::Null);
    }
    *current = value;
}

#[async_trait]
impl ResourceApi for DryRunApi {
    async fn create(&self, resource: &ResolvedResource) -> Result<ProvisionedResource, ApiError> {
        let sequence = self.next();
        let physical_id = format!("{}-{:08x}", Self::prefix(resource.kind), sequence);
        let attributes = Self::attributes(resource, &physical_id, sequence);

        info!(node = %resource.id, kind = resource.kind.type_name(), physical_id = %physical_id, "dry run create");
        self.calls.lock().await.push(RecordedCall::Create {
            id: resource.id.clone(),
            physical_id: physical_id.clone(),
        });
        Ok(ProvisionedResource {
            physical_id,
            attributes,
        })
    }

    async fn delete(&self, resource: &ResolvedResource, physical_id: &str) -> Result<(), ApiError> {
        info!(node = %resource.id, physical_id = %physical_id, "dry run delete");
        self.calls.lock().await.push(RecordedCall::Delete {
            id: resource.id.clone(),
            physical_id: physical_id.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl ResourceActionApi for DryRunApi {
    async fn invoke(&self, call: &SdkCall) -> Result<Value, ApiError> {
        info!(service = %call.service, action = %call.action, "dry run invoke");
        self.calls.lock().await.push(RecordedCall::Invoke {
            action: call.action.clone(),
            parameters: call.parameters.clone(),
        });

        let mut response = json!({});
        let fabricated = format!("{}-{:08x}", call.service.to_lowercase(), self.next());
        if let Some(PhysicalResourceId::FromResponse(path)) = &call.physical_resource_id {
            set_path(&mut response, path, json!(fabricated));
        }
        for path in &call.output_paths {
            if response_path(&response, path).is_none() {
                set_path(&mut response, path, json!(fabricated));
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{physical_resource_id_reference, PolicyStatement};
    use crate::graph::Unit;

    fn small_graph() -> (ResourceGraph, NodeId, NodeId) {
        let mut graph = ResourceGraph::new();
        let cgw = graph
            .declare(Unit::Vpn, "Cgw", ResourceKind::CustomerGateway, json!({ "Type": "ipsec.1" }))
            .unwrap();
        let vgw = graph
            .declare(Unit::Vpn, "Vgw", ResourceKind::VpnGateway, json!({ "Type": "ipsec.1" }))
            .unwrap();
        let create = SdkCall::new(
            "EC2",
            "createVpnConnection",
            json!({ "CustomerGatewayId": cgw.reference(), "VpnGatewayId": vgw.reference() }),
        )
        .with_output_paths(&["VpnConnection.VpnConnectionId"])
        .with_physical_resource_id(PhysicalResourceId::FromResponse(
            "VpnConnection.VpnConnectionId".to_string(),
        ));
        let delete = SdkCall::new(
            "EC2",
            "deleteVpnConnection",
            json!({ "VpnConnectionId": physical_resource_id_reference() }),
        );
        let vpn = graph
            .declare_action(
                Unit::Vpn,
                "Vpn",
                ExternalAction::new(create, Some(delete), PolicyStatement::default()),
            )
            .unwrap();
        let route = graph
            .declare(
                Unit::Vpn,
                "Route",
                ResourceKind::VpnConnectionRoute,
                json!({ "VpnConnectionId": vpn.attribute("VpnConnection.VpnConnectionId") }),
            )
            .unwrap();
        (graph, vpn.id().clone(), route.id().clone())
    }

    #[test]
    fn test_set_path() {
        let mut document = json!({});
        set_path(&mut document, "VpnConnection.VpnConnectionId", json!("vpn-1"));
        assert_eq!(document, json!({ "VpnConnection": { "VpnConnectionId": "vpn-1" } }));
    }

    #[test]
    fn test_capture_requires_physical_id() {
        let call = SdkCall::new("EC2", "createVpnConnection", json!({}))
            .with_physical_resource_id(PhysicalResourceId::FromResponse("VpnConnection.VpnConnectionId".to_string()));
        assert!(capture(&call, &json!({})).is_err());

        let produced = capture(&call, &json!({ "VpnConnection": { "VpnConnectionId": "vpn-9" } })).unwrap();
        assert_eq!(produced.physical_id, "vpn-9");
    }

    #[tokio::test]
    async fn test_apply_resolves_action_output() {
        let (graph, vpn, route) = small_graph();
        let mut executor = GraphExecutor::new(DryRunApi::new(), DryRunApi::new());
        executor.apply(&graph).await.unwrap();

        let record = executor.lifecycle(&vpn).unwrap();
        assert_eq!(record.state(), ConnectionState::Created);
        assert_eq!(record.customer_gateway_id(), "cgw-00000001");
        assert_eq!(record.virtual_gateway_id(), "vgw-00000002");

        let connection_id = record.vpn_connection_id().unwrap().to_string();
        let resolved = &executor.resolved[&route];
        assert_eq!(resolved.properties["VpnConnectionId"], json!(connection_id));
    }

    #[tokio::test]
    async fn test_teardown_replays_captured_id() {
        let (graph, vpn, _) = small_graph();
        let mut executor = GraphExecutor::new(DryRunApi::new(), DryRunApi::new());
        executor.apply(&graph).await.unwrap();
        let captured = executor.lifecycle(&vpn).unwrap().vpn_connection_id().unwrap().to_string();

        executor.teardown(&graph).await.unwrap();

        assert!(executor.created().is_empty());
        assert_eq!(executor.lifecycle(&vpn).unwrap().state(), ConnectionState::Deleted);
        let calls = executor.action_api().calls().await;
        assert_eq!(
            calls.last(),
            Some(&RecordedCall::Invoke {
                action: "deleteVpnConnection".to_string(),
                parameters: json!({ "VpnConnectionId": captured }),
            })
        );
    }
}
