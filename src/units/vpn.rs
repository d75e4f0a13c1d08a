// Copyright (c) 2025 - Cowboy AI, Inc.
//! VPN Interconnect Unit
//!
//! Joins the two networks with a site-to-site VPN. The connection itself is
//! an external action node: its identifier only exists once the create call
//! has returned, so everything that reads the identifier, and every route
//! propagation, waits on that node.
//!
//! # Declaration Order
//!
//! ```text
//! 1. customer gateway      (router public address, ASN 65000)
//! 2. virtual gateway
//! 3. VPN connection        external action, static routes only
//! 4. static route          on-prem range over the connection
//! 5. gateway attachment    virtual gateway -> cloud network
//! 6. route propagation     one per cloud route table, gated on 3
//! ```

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{NetworkUnitOutput, VpcHandle};
use crate::config::DeploymentEnv;
use crate::errors::{TopologyError, TopologyResult};
use crate::external::{
    format_arn, physical_resource_id_reference, ExternalAction, PhysicalResourceId, PolicyStatement, SdkCall,
};
use crate::graph::{NodeRef, ResourceGraph, ResourceKind, Unit};
use crate::naming::name;

/// Autonomous-system number announced for the on-prem side
pub const CUSTOMER_GATEWAY_ASN: u32 = 65000;

/// IPsec connection type
pub const VPN_TYPE: &str = "ipsec.1";

/// Where the create response carries the connection identifier
pub const VPN_CONNECTION_ID_PATH: &str = "VpnConnection.VpnConnectionId";

/// Identity base of propagations into public route tables
pub const PUBLIC_PROPAGATION_BASE: &str = "VpnGatewayRoutePropagation";

/// Identity base of propagations into isolated route tables
pub const ISOLATED_PROPAGATION_BASE: &str = "VpnGatewayRoutePropagationIsolated";

/// Handles produced by the interconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnInterconnectOutput {
    pub customer_gateway: NodeRef,
    pub virtual_gateway: NodeRef,
    /// External action node behind the VPN connection
    pub connection: NodeRef,
    pub static_route: NodeRef,
    pub attachment: NodeRef,
    pub propagations: Vec<NodeRef>,
}

impl VpnInterconnectOutput {
    /// Connection identifier, readable once the create call returned
    pub fn connection_id(&self) -> Value {
        ExternalAction::response_field(&self.connection, VPN_CONNECTION_ID_PATH)
    }
}

/// VPN interconnect unit
#[derive(Debug, Clone)]
pub struct VpnInterconnectUnit<'a> {
    cloud: &'a NetworkUnitOutput,
    on_prem: &'a NetworkUnitOutput,
    env: &'a DeploymentEnv,
}

/// Create/delete pair and permission scope of the VPN connection
///
/// The delete call replays the identifier captured from the create
/// response. The policy names the two gateways and a wildcard connection
/// ARN, since the connection id is unknown when permissions are granted.
/// ARNs name the configured account and region when `env` carries them.
pub fn vpn_connection_action(
    customer_gateway: &NodeRef,
    virtual_gateway: &NodeRef,
    env: &DeploymentEnv,
) -> ExternalAction {
    let on_create = SdkCall::new(
        "EC2",
        "createVpnConnection",
        json!({
            "CustomerGatewayId": customer_gateway.reference(),
            "Type": VPN_TYPE,
            "Options": { "StaticRoutesOnly": true },
            "VpnGatewayId": virtual_gateway.reference(),
        }),
    )
    .with_output_paths(&[VPN_CONNECTION_ID_PATH])
    .with_physical_resource_id(PhysicalResourceId::FromResponse(VPN_CONNECTION_ID_PATH.to_string()));

    let on_delete = SdkCall::new(
        "EC2",
        "deleteVpnConnection",
        json!({ "VpnConnectionId": physical_resource_id_reference() }),
    );

    let policy = PolicyStatement::from_sdk_calls(
        &[&on_create, &on_delete],
        vec![
            format_arn(env, "ec2", "vpn-gateway", virtual_gateway.reference()),
            format_arn(env, "ec2", "customer-gateway", customer_gateway.reference()),
            format_arn(env, "ec2", "vpn-connection", json!("*")),
        ],
    );

    ExternalAction::new(on_create, Some(on_delete), policy)
}

impl<'a> VpnInterconnectUnit<'a> {
    /// `on_prem` must carry the router addresses
    pub fn new(cloud: &'a NetworkUnitOutput, on_prem: &'a NetworkUnitOutput, env: &'a DeploymentEnv) -> Self {
        Self { cloud, on_prem, env }
    }

    /// Declare the unit into `graph`
    pub fn build(&self, graph: &mut ResourceGraph) -> TopologyResult<VpnInterconnectOutput> {
        let unit = Unit::Vpn;
        let router = self
            .on_prem
            .router
            .as_ref()
            .ok_or_else(|| TopologyError::declaration("CustomerGateway", "on-premise side declared no router"))?;

        let customer_gateway = graph.declare(
            unit,
            "CustomerGateway",
            ResourceKind::CustomerGateway,
            json!({
                "BgpAsn": CUSTOMER_GATEWAY_ASN,
                "IpAddress": router.public_address,
                "Type": VPN_TYPE,
            }),
        )?;
        graph.tag(&customer_gateway, "Name", "Customer Gateway")?;

        let virtual_gateway = graph.declare(
            unit,
            "VirtualPrivateGateway",
            ResourceKind::VpnGateway,
            json!({ "Type": VPN_TYPE }),
        )?;
        graph.tag(&virtual_gateway, "Name", "Virtual Private Gateway")?;

        let connection = graph.declare_action(
            unit,
            "VpnConnection",
            vpn_connection_action(&customer_gateway, &virtual_gateway, self.env),
        )?;
        let connection_id = ExternalAction::response_field(&connection, VPN_CONNECTION_ID_PATH);

        // Static routing only: the on-prem range must be routed by hand
        let static_route = graph.declare(
            unit,
            "VpnConnectionStaticRoute",
            ResourceKind::VpnConnectionRoute,
            json!({
                "DestinationCidrBlock": self.on_prem.network.cidr.as_str(),
                "VpnConnectionId": connection_id,
            }),
        )?;

        let attachment = graph.declare(
            unit,
            "VirtualPrivateGatewayAttachment",
            ResourceKind::VpcGatewayAttachment,
            json!({
                "VpcId": self.cloud.network.vpc_id(),
                "VpnGatewayId": virtual_gateway.reference(),
            }),
        )?;

        let propagations = self.declare_propagations(graph, &self.cloud.network, &virtual_gateway, &connection, &attachment)?;

        info!(
            unit = %unit,
            propagations = propagations.len(),
            on_prem = %self.on_prem.network.cidr,
            "VPN interconnect declared"
        );

        Ok(VpnInterconnectOutput {
            customer_gateway,
            virtual_gateway,
            connection,
            static_route,
            attachment,
            propagations,
        })
    }

    fn declare_propagations(
        &self,
        graph: &mut ResourceGraph,
        network: &VpcHandle,
        virtual_gateway: &NodeRef,
        connection: &NodeRef,
        attachment: &NodeRef,
    ) -> TopologyResult<Vec<NodeRef>> {
        let tables = network
            .public_route_table_ids()
            .into_iter()
            .enumerate()
            .map(|(index, table)| (name(PUBLIC_PROPAGATION_BASE, index), table))
            .chain(
                network
                    .isolated_route_table_ids()
                    .into_iter()
                    .enumerate()
                    .map(|(index, table)| (name(ISOLATED_PROPAGATION_BASE, index), table)),
            );

        let mut propagations = Vec::new();
        for (id, table) in tables {
            let propagation = graph.declare(
                Unit::Vpn,
                &id,
                ResourceKind::VpnGatewayRoutePropagation,
                json!({
                    "RouteTableIds": [table],
                    "VpnGatewayId": virtual_gateway.reference(),
                }),
            )?;
            // Propagating into a gateway with no live connection is rejected
            graph.add_dependency(&propagation, connection)?;
            graph.add_dependency(&propagation, attachment)?;
            debug!(propagation = %propagation.id(), gate = %connection.id(), "route propagation gated");
            propagations.push(propagation);
        }
        Ok(propagations)
    }
}
