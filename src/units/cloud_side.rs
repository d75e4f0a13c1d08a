// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cloud-side network unit
//!
//! Declares the recovery-site network: one isolated workload instance and the
//! private-access endpoints the disaster-recovery agent needs.

use tracing::info;

use super::compute::{
    declare_instance, declare_instance_role, declare_security_group, IngressRule, InstanceSpec, Peer, Port,
    DRS_AGENT_PORT, SSM_CORE_POLICY,
};
use super::endpoint::{declare_interface_endpoint, declare_s3_gateway_endpoint, InterfaceEndpoint};
use super::vpc::{declare_vpc, VpcSpec};
use super::NetworkUnitOutput;
use crate::config::DeploymentEnv;
use crate::domain::AddressSpacePlan;
use crate::errors::{TopologyError, TopologyResult};
use crate::graph::{ResourceGraph, Unit};

const HTTPS: u16 = 443;

/// Cloud-side network unit
#[derive(Debug, Clone)]
pub struct CloudSideNetworkUnit<'a> {
    plan: &'a AddressSpacePlan,
    env: &'a DeploymentEnv,
}

impl<'a> CloudSideNetworkUnit<'a> {
    pub fn new(plan: &'a AddressSpacePlan, env: &'a DeploymentEnv) -> Self {
        Self { plan, env }
    }

    /// Declare the unit into `graph`
    pub fn build(&self, graph: &mut ResourceGraph) -> TopologyResult<NetworkUnitOutput> {
        let unit = Unit::CloudSide;
        let cloud = *self.plan.cloud_cidr();
        let on_prem = *self.plan.on_prem_cidr();

        let network = declare_vpc(
            graph,
            unit,
            &VpcSpec {
                id: "AwsVpc",
                display_name: "AWS VPC",
                cidr: cloud,
                max_azs: self.plan.az_count(),
            },
        )?;

        let instance_group = declare_security_group(
            graph,
            unit,
            "AwsInstanceSecurityGroup",
            &network,
            &[
                IngressRule::new(Peer::Ipv4(on_prem), Port::IcmpPing, "Allow Ping from on-premise side"),
                IngressRule::new(Peer::Ipv4(on_prem), Port::Tcp(HTTPS), "Allow HTTPS from on-premise side"),
                IngressRule::new(
                    Peer::Ipv4(on_prem),
                    Port::Tcp(DRS_AGENT_PORT),
                    "Allow port 1500 from on-premise side (used for EDR)",
                ),
            ],
        )?;
        let role = declare_instance_role(graph, unit, "AwsInstanceEc2Role", &[SSM_CORE_POLICY])?;

        let workload_subnet = network
            .isolated_subnets
            .first()
            .ok_or_else(|| TopologyError::declaration("AwsVpc", "network has no isolated subnet"))?;
        let instance = declare_instance(
            graph,
            unit,
            &InstanceSpec {
                id: "AwsPrivateInstance",
                display_name: "AWS-side private instance",
                subnet: workload_subnet,
                security_group: &instance_group,
                role: &role,
                source_dest_check: true,
            },
        )?;

        let endpoint_group = declare_security_group(
            graph,
            unit,
            "VpcEndpointSecurityGroup",
            &network,
            &[
                IngressRule::new(
                    Peer::Ipv4(cloud),
                    Port::Tcp(HTTPS),
                    "Allow HTTPS traffic from AWS side to interface endpoint",
                ),
                IngressRule::new(
                    Peer::Ipv4(on_prem),
                    Port::Tcp(HTTPS),
                    "Allow HTTPS traffic from on-premise side to interface endpoint",
                ),
            ],
        )?;

        let endpoints = [
            ("AwsVpcS3InterfaceEndpoint", "s3", "S3 interface endpoint", false),
            ("AwsVpcEdrInterfaceEndpoint", "drs", "EDR interface endpoint", true),
            ("AwsVpcEc2InterfaceEndpoint", "ec2", "EC2 interface endpoint", true),
        ];
        for (id, service, display_name, private_dns) in endpoints {
            declare_interface_endpoint(
                graph,
                unit,
                &network,
                self.env,
                &InterfaceEndpoint {
                    id,
                    service,
                    display_name,
                    private_dns,
                    security_group: &endpoint_group,
                },
            )?;
        }
        declare_s3_gateway_endpoint(graph, unit, "AwsVpcS3GatewayEndpoint", &network, self.env)?;

        info!(unit = %unit, cidr = %cloud, zones = self.plan.az_count(), "cloud-side network declared");

        Ok(NetworkUnitOutput {
            network,
            primary_instance_address: instance.private_ip(),
            router: None,
        })
    }
}
