// Copyright (c) 2025 - Cowboy AI, Inc.
//! On-premise-simulating network unit
//!
//! A router instance in a public subnet forwards traffic for the isolated
//! subnets toward the cloud range. Every isolated route table gets its own
//! route entry, identified by `name("PrivateSubnetVpnConnectionRoute", i)`.

use serde_json::json;
use tracing::{debug, info};

use super::compute::{
    declare_instance, declare_instance_role, declare_security_group, IngressRule, InstanceSpec, Peer, Port,
    DRS_AGENT_INSTALLATION_POLICY, DRS_EC2_INSTANCE_POLICY, SSM_CORE_POLICY,
};
use super::endpoint::{declare_interface_endpoint, declare_s3_gateway_endpoint, InterfaceEndpoint};
use super::vpc::{declare_vpc, VpcSpec};
use super::{NetworkUnitOutput, RouterOutput};
use crate::config::DeploymentEnv;
use crate::domain::AddressSpacePlan;
use crate::errors::{TopologyError, TopologyResult};
use crate::graph::{ResourceGraph, ResourceKind, Unit};
use crate::naming::name;

/// Base identity of the per-subnet route entries
pub const ROUTE_ENTRY_BASE: &str = "PrivateSubnetVpnConnectionRoute";

/// On-premise-simulating network unit
#[derive(Debug, Clone)]
pub struct OnPremSideNetworkUnit<'a> {
    plan: &'a AddressSpacePlan,
    env: &'a DeploymentEnv,
}

impl<'a> OnPremSideNetworkUnit<'a> {
    pub fn new(plan: &'a AddressSpacePlan, env: &'a DeploymentEnv) -> Self {
        Self { plan, env }
    }

    /// Declare the unit into `graph`
    pub fn build(&self, graph: &mut ResourceGraph) -> TopologyResult<NetworkUnitOutput> {
        let unit = Unit::OnPremSide;
        let cloud = *self.plan.cloud_cidr();
        let on_prem = *self.plan.on_prem_cidr();

        let network = declare_vpc(
            graph,
            unit,
            &VpcSpec {
                id: "OnPremiseVpc",
                display_name: "On-premise VPC",
                cidr: on_prem,
                max_azs: self.plan.az_count(),
            },
        )?;

        let group = declare_security_group(
            graph,
            unit,
            "OnPremiseInstanceSecurityGroup",
            &network,
            &[
                IngressRule::new(Peer::Ipv4(cloud), Port::IcmpPing, "Allow ping from AWS side"),
                IngressRule::new(
                    Peer::SelfGroup,
                    Port::AllTcp,
                    "Allow all TCP traffic from within this security group",
                ),
                IngressRule::new(Peer::SelfGroup, Port::IcmpPing, "Allow ping from within this security group"),
            ],
        )?;

        let router_role = declare_instance_role(graph, unit, "RouterInstanceEc2Role", &[SSM_CORE_POLICY])?;
        let private_role = declare_instance_role(
            graph,
            unit,
            "PrivateInstanceEc2Role",
            &[SSM_CORE_POLICY, DRS_AGENT_INSTALLATION_POLICY, DRS_EC2_INSTANCE_POLICY],
        )?;

        let missing = |kind: &str| TopologyError::declaration("OnPremiseVpc", format!("network has no {} subnet", kind));
        let public_subnet = network.public_subnets.first().ok_or_else(|| missing("public"))?;
        let isolated_subnet = network.isolated_subnets.first().ok_or_else(|| missing("isolated"))?;

        let router = declare_instance(
            graph,
            unit,
            &InstanceSpec {
                id: "OnPremiseRouterInstance",
                display_name: "On-premise router instance",
                subnet: public_subnet,
                security_group: &group,
                role: &router_role,
                // Forwards traffic it neither originates nor terminates
                source_dest_check: false,
            },
        )?;
        let private_instance = declare_instance(
            graph,
            unit,
            &InstanceSpec {
                id: "OnPremisePrivateInstance",
                display_name: "On-premise private instance",
                subnet: isolated_subnet,
                security_group: &group,
                role: &private_role,
                source_dest_check: true,
            },
        )?;

        let endpoint_group = declare_security_group(
            graph,
            unit,
            "VpcEndpointSecurityGroup",
            &network,
            &[IngressRule::new(
                Peer::Ipv4(on_prem),
                Port::Tcp(443),
                "Allow HTTPS traffic from on-premise side to interface endpoint",
            )],
        )?;
        let endpoints = [
            ("OnPremiseVpcSsmInterfaceEndpoint", "ssm", "SSM interface endpoint"),
            ("OnPremiseVpcEc2MessagesInterfaceEndpoint", "ec2messages", "EC2 messages interface endpoint"),
            ("OnPremiseVpcSsmMessagesInterfaceEndpoint", "ssmmessages", "SSM messages interface endpoint"),
        ];
        for (id, service, display_name) in endpoints {
            declare_interface_endpoint(
                graph,
                unit,
                &network,
                self.env,
                &InterfaceEndpoint {
                    id,
                    service,
                    display_name,
                    private_dns: true,
                    security_group: &endpoint_group,
                },
            )?;
        }
        declare_s3_gateway_endpoint(graph, unit, "OnPremiseVpcS3GatewayEndpoint", &network, self.env)?;

        for (index, subnet) in network.isolated_subnets.iter().enumerate() {
            let route = graph.declare(
                unit,
                &name(ROUTE_ENTRY_BASE, index),
                ResourceKind::Route,
                json!({
                    "DestinationCidrBlock": cloud.as_str(),
                    "RouteTableId": subnet.route_table_id(),
                    "InstanceId": router.instance_id(),
                }),
            )?;
            debug!(route = %route.id(), zone = subnet.zone_index, "route toward cloud range via router");
        }

        info!(
            unit = %unit,
            cidr = %on_prem,
            routes = network.isolated_subnets.len(),
            "on-premise network declared"
        );

        Ok(NetworkUnitOutput {
            primary_instance_address: private_instance.private_ip(),
            router: Some(RouterOutput {
                public_address: router.public_ip(),
                private_address: router.private_ip(),
                instance: router,
            }),
            network,
        })
    }
}
