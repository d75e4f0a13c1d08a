// Copyright (c) 2025 - Cowboy AI, Inc.
//! Private-access endpoints

use serde_json::json;

use super::vpc::VpcHandle;
use crate::config::DeploymentEnv;
use crate::errors::TopologyResult;
use crate::graph::{NodeRef, ResourceGraph, ResourceKind, Unit};

/// Interface endpoint placed in every isolated subnet
pub struct InterfaceEndpoint<'a> {
    pub id: &'a str,
    /// Short service name (`s3`, `drs`, `ec2`, ...)
    pub service: &'a str,
    /// `Name` tag
    pub display_name: &'a str,
    pub private_dns: bool,
    pub security_group: &'a NodeRef,
}

/// Declare an interface endpoint
pub fn declare_interface_endpoint(
    graph: &mut ResourceGraph,
    unit: Unit,
    vpc: &VpcHandle,
    env: &DeploymentEnv,
    endpoint: &InterfaceEndpoint<'_>,
) -> TopologyResult<NodeRef> {
    let node = graph.declare(
        unit,
        endpoint.id,
        ResourceKind::VpcEndpoint,
        json!({
            "ServiceName": env.endpoint_service_name(endpoint.service),
            "VpcEndpointType": "Interface",
            "VpcId": vpc.vpc_id(),
            "PrivateDnsEnabled": endpoint.private_dns,
            "SecurityGroupIds": [endpoint.security_group.attribute("GroupId")],
            "SubnetIds": vpc.isolated_subnet_ids(),
        }),
    )?;
    graph.tag(&node, "Name", endpoint.display_name)?;
    Ok(node)
}

/// Declare an object-storage gateway endpoint serving every route table
pub fn declare_s3_gateway_endpoint(
    graph: &mut ResourceGraph,
    unit: Unit,
    id: &str,
    vpc: &VpcHandle,
    env: &DeploymentEnv,
) -> TopologyResult<NodeRef> {
    let node = graph.declare(
        unit,
        id,
        ResourceKind::VpcEndpoint,
        json!({
            "ServiceName": env.endpoint_service_name("s3"),
            "VpcEndpointType": "Gateway",
            "VpcId": vpc.vpc_id(),
            "RouteTableIds": vpc.all_route_table_ids(),
        }),
    )?;
    graph.tag(&node, "Name", "S3 gateway endpoint")?;
    Ok(node)
}
