// Copyright (c) 2025 - Cowboy AI, Inc.
//! Graph executor tests
//!
//! Drive the composed topology against fake provider collaborators and check
//! the VPN connection lifecycle.

mod fixtures;

use fixtures::*;
use serde_json::json;
use std::sync::atomic::Ordering;

use cim_dr_topology::composer::{compose, outputs};
use cim_dr_topology::executor::{DryRunApi, GraphExecutor, RecordedCall};
use cim_dr_topology::graph::ResourceKind;
use cim_dr_topology::state_machine::ConnectionState;
use cim_dr_topology::TopologyError;

#[tokio::test]
async fn test_apply_moves_connection_to_created() {
    let topology = compose(&build_config(2), &deployment_env()).unwrap();
    let mut executor = GraphExecutor::new(DryRunApi::new(), DryRunApi::new());

    let report = executor.apply(&topology.graph).await.unwrap();
    assert_eq!(report.created.len(), topology.graph.nodes().len());
    assert_eq!(report.run_id, executor.run_id());

    let record = executor.lifecycle(topology.vpn.connection.id()).unwrap();
    assert_eq!(record.state(), ConnectionState::Created);
    assert!(record.vpn_connection_id().is_some());
    assert_eq!(
        record.customer_gateway_id(),
        executor.provisioned(topology.vpn.customer_gateway.id()).unwrap().physical_id
    );
    assert_eq!(
        record.virtual_gateway_id(),
        executor.provisioned(topology.vpn.virtual_gateway.id()).unwrap().physical_id
    );
}

#[tokio::test]
async fn test_outputs_are_resolved() {
    let topology = compose(&build_config(1), &deployment_env()).unwrap();
    let mut executor = GraphExecutor::new(DryRunApi::new(), DryRunApi::new());
    let report = executor.apply(&topology.graph).await.unwrap();

    assert_eq!(report.outputs[outputs::AWS_CIDR], json!(AWS_CIDR));
    assert_eq!(report.outputs[outputs::REGION], json!(REGION));
    assert!(report.outputs[outputs::ON_PREMISE_ROUTER_PUBLIC_IP]
        .as_str()
        .unwrap()
        .starts_with("203.0.113."));
}

#[tokio::test]
async fn test_create_failure_stops_before_propagation() {
    let topology = compose(&build_config(2), &deployment_env()).unwrap();
    let mut executor = GraphExecutor::new(DryRunApi::new(), RejectingActionApi::default());

    let err = executor.apply(&topology.graph).await.unwrap_err();
    assert!(matches!(err, TopologyError::LifecycleCallFailure { .. }));

    let record = executor.lifecycle(topology.vpn.connection.id()).unwrap();
    assert_eq!(record.state(), ConnectionState::Failed);
    assert_eq!(record.vpn_connection_id(), None);
    assert_eq!(executor.action_api().invocations.load(Ordering::SeqCst), 1);

    let created = executor.created();
    for propagation in &topology.vpn.propagations {
        assert!(!created.contains(propagation.id()));
    }
    assert!(!created.contains(topology.vpn.static_route.id()));
}

#[tokio::test]
async fn test_declaration_failure_is_fatal() {
    let topology = compose(&build_config(1), &deployment_env()).unwrap();
    let mut executor = GraphExecutor::new(
        RejectingResourceApi::new(ResourceKind::CustomerGateway.type_name()),
        DryRunApi::new(),
    );

    let err = executor.apply(&topology.graph).await.unwrap_err();
    match err {
        TopologyError::ExternalDeclarationFailure { resource, .. } => {
            assert_eq!(resource, topology.vpn.customer_gateway.id().as_str());
        }
        other => panic!("unexpected error: {}", other),
    }
    // The connection was never requested
    assert!(executor.lifecycles().is_empty());
}

#[tokio::test]
async fn test_teardown_replays_captured_identifier() {
    let topology = compose(&build_config(2), &deployment_env()).unwrap();
    let mut executor = GraphExecutor::new(DryRunApi::new(), DryRunApi::new());
    executor.apply(&topology.graph).await.unwrap();

    let connection = topology.vpn.connection.id();
    let captured = executor
        .lifecycle(connection)
        .and_then(|r| r.vpn_connection_id())
        .unwrap()
        .to_string();

    executor.teardown(&topology.graph).await.unwrap();

    let record = executor.lifecycle(connection).unwrap();
    assert_eq!(
        record.states(),
        vec![
            ConnectionState::Requested,
            ConnectionState::Created,
            ConnectionState::DeletionRequested,
            ConnectionState::Deleted,
        ]
    );
    let deletes: Vec<RecordedCall> = executor
        .action_api()
        .calls()
        .await
        .into_iter()
        .filter(|call| matches!(call, RecordedCall::Invoke { action, .. } if action == "deleteVpnConnection"))
        .collect();
    assert_eq!(
        deletes,
        vec![RecordedCall::Invoke {
            action: "deleteVpnConnection".to_string(),
            parameters: json!({ "VpnConnectionId": captured }),
        }]
    );
    assert!(executor.created().is_empty());
}

#[tokio::test]
async fn test_teardown_deletes_propagations_before_connection() {
    let topology = compose(&build_config(1), &deployment_env()).unwrap();
    let resources = DryRunApi::new();
    let mut executor = GraphExecutor::new(resources, DryRunApi::new());
    executor.apply(&topology.graph).await.unwrap();
    executor.teardown(&topology.graph).await.unwrap();

    let deleted: Vec<String> = executor
        .resource_api()
        .calls()
        .await
        .into_iter()
        .filter_map(|call| match call {
            RecordedCall::Delete { id, .. } => Some(id.as_str().to_string()),
            _ => None,
        })
        .collect();
    let position = |id: &str| deleted.iter().position(|d| d == id).unwrap();

    for propagation in &topology.vpn.propagations {
        assert!(position(propagation.id().as_str()) < position(topology.vpn.customer_gateway.id().as_str()));
    }
}

#[test]
fn test_delete_failure_marks_record_failed() {
    tokio_test::block_on(async {
        let topology = compose(&build_config(1), &deployment_env()).unwrap();
        let mut executor = GraphExecutor::new(DryRunApi::new(), FailingDeleteActionApi::default());
        executor.apply(&topology.graph).await.unwrap();

        let err = executor.teardown(&topology.graph).await.unwrap_err();
        assert!(matches!(err, TopologyError::LifecycleCallFailure { .. }));

        let record = executor.lifecycle(topology.vpn.connection.id()).unwrap();
        assert_eq!(record.state(), ConnectionState::Failed);
        // Identifier is kept for a later retry by the operator
        assert!(record.vpn_connection_id().is_some());
    });
}
