// Copyright (c) 2025 - Cowboy AI, Inc.
//! Virtual network declaration
//!
//! One public and one isolated subnet per availability zone, no NAT gateways.
//! Subnet ranges are carved by the engine (`Fn::Cidr` over the network's own
//! block); only the number of host bits per subnet is chosen here.
//!
//! Zones are picked with `Fn::GetAZs`, so asking for more zones than the
//! region has fails inside the engine as a declaration failure.

use serde_json::{json, Value};

use crate::domain::CidrBlock;
use crate::errors::{TopologyError, TopologyResult};
use crate::graph::{NodeRef, ResourceGraph, ResourceKind, Unit};
use crate::naming::name;

/// Smallest subnet the provider allows (/28)
const MIN_SUBNET_HOST_BITS: u8 = 4;

/// What to declare
#[derive(Debug, Clone)]
pub struct VpcSpec<'a> {
    /// Local identity inside the unit
    pub id: &'a str,
    /// `Name` tag
    pub display_name: &'a str,
    pub cidr: CidrBlock,
    pub max_azs: usize,
}

/// A declared subnet and its route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetHandle {
    pub subnet: NodeRef,
    pub route_table: NodeRef,
    pub zone_index: usize,
}

impl SubnetHandle {
    /// Route table identifier
    pub fn route_table_id(&self) -> Value {
        self.route_table.reference()
    }

    /// Subnet identifier
    pub fn subnet_id(&self) -> Value {
        self.subnet.reference()
    }
}

/// A declared virtual network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcHandle {
    pub vpc: NodeRef,
    pub cidr: CidrBlock,
    pub public_subnets: Vec<SubnetHandle>,
    pub isolated_subnets: Vec<SubnetHandle>,
}

impl VpcHandle {
    /// Network identifier
    pub fn vpc_id(&self) -> Value {
        self.vpc.reference()
    }

    /// Route tables of the public subnets, in zone order
    pub fn public_route_table_ids(&self) -> Vec<Value> {
        self.public_subnets.iter().map(SubnetHandle::route_table_id).collect()
    }

    /// Route tables of the isolated subnets, in zone order
    pub fn isolated_route_table_ids(&self) -> Vec<Value> {
        self.isolated_subnets.iter().map(SubnetHandle::route_table_id).collect()
    }

    /// Every subnet's route table, public first
    pub fn all_route_table_ids(&self) -> Vec<Value> {
        let mut ids = self.public_route_table_ids();
        ids.extend(self.isolated_route_table_ids());
        ids
    }

    /// Isolated subnet ids, in zone order
    pub fn isolated_subnet_ids(&self) -> Vec<Value> {
        self.isolated_subnets.iter().map(SubnetHandle::subnet_id).collect()
    }
}

/// Host bits per subnet when `block` is split into `subnets` equal parts
pub fn subnet_host_bits(block: &CidrBlock, subnets: usize) -> TopologyResult<u8> {
    let split_bits = subnets.max(1).next_power_of_two().trailing_zeros() as u8;
    let host_bits = 32u8
        .checked_sub(block.prefix_length() + split_bits)
        .filter(|bits| *bits >= MIN_SUBNET_HOST_BITS)
        .ok_or_else(|| {
            TopologyError::declaration(
                block.as_str(),
                format!("block too small for {} subnets of at least /28", subnets),
            )
        })?;
    Ok(host_bits)
}

/// Declare a virtual network with its subnets and routing
pub fn declare_vpc(graph: &mut ResourceGraph, unit: Unit, spec: &VpcSpec<'_>) -> TopologyResult<VpcHandle> {
    let subnet_count = spec.max_azs * 2;
    let host_bits = subnet_host_bits(&spec.cidr, subnet_count)?;

    let vpc = graph.declare(
        unit,
        spec.id,
        ResourceKind::Vpc,
        json!({
            "CidrBlock": spec.cidr.as_str(),
            "EnableDnsHostnames": true,
            "EnableDnsSupport": true,
            "InstanceTenancy": "default",
        }),
    )?;
    graph.tag(&vpc, "Name", spec.display_name)?;

    let igw = graph.declare(unit, &format!("{}IGW", spec.id), ResourceKind::InternetGateway, json!({}))?;
    graph.tag(&igw, "Name", spec.display_name)?;
    let igw_attachment = graph.declare(
        unit,
        &format!("{}VPCGW", spec.id),
        ResourceKind::VpcGatewayAttachment,
        json!({
            "VpcId": vpc.reference(),
            "InternetGatewayId": igw.reference(),
        }),
    )?;

    let subnet_range = |position: usize| {
        json!({
            "Fn::Select": [position, { "Fn::Cidr": [vpc.attribute("CidrBlock"), subnet_count, host_bits] }]
        })
    };
    let zone = |index: usize| json!({ "Fn::Select": [index, { "Fn::GetAZs": "" }] });

    let mut public_subnets = Vec::with_capacity(spec.max_azs);
    for index in 0..spec.max_azs {
        let base = format!("{}PublicSubnet", spec.id);
        let handle = declare_subnet(graph, unit, &name(&base, index + 1), &vpc, subnet_range(index), zone(index), true, index)?;

        let default_route = graph.declare(
            unit,
            &format!("{}DefaultRoute", name(&base, index + 1)),
            ResourceKind::Route,
            json!({
                "RouteTableId": handle.route_table_id(),
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": igw.reference(),
            }),
        )?;
        // The route is invalid until the gateway is attached
        graph.add_dependency(&default_route, &igw_attachment)?;

        public_subnets.push(handle);
    }

    let mut isolated_subnets = Vec::with_capacity(spec.max_azs);
    for index in 0..spec.max_azs {
        let base = format!("{}IsolatedSubnet", spec.id);
        let handle = declare_subnet(
            graph,
            unit,
            &name(&base, index + 1),
            &vpc,
            subnet_range(spec.max_azs + index),
            zone(index),
            false,
            index,
        )?;
        isolated_subnets.push(handle);
    }

    Ok(VpcHandle {
        vpc,
        cidr: spec.cidr,
        public_subnets,
        isolated_subnets,
    })
}

#[allow(clippy::too_many_arguments)]
fn declare_subnet(
    graph: &mut ResourceGraph,
    unit: Unit,
    id: &str,
    vpc: &NodeRef,
    range: Value,
    zone: Value,
    public: bool,
    zone_index: usize,
) -> TopologyResult<SubnetHandle> {
    let subnet = graph.declare(
        unit,
        id,
        ResourceKind::Subnet,
        json!({
            "VpcId": vpc.reference(),
            "CidrBlock": range,
            "AvailabilityZone": zone,
            "MapPublicIpOnLaunch": public,
        }),
    )?;
    graph.tag(&subnet, "Name", id)?;

    let route_table = graph.declare(
        unit,
        &format!("{}RouteTable", id),
        ResourceKind::RouteTable,
        json!({ "VpcId": vpc.reference() }),
    )?;
    graph.tag(&route_table, "Name", id)?;

    graph.declare(
        unit,
        &format!("{}RouteTableAssociation", id),
        ResourceKind::SubnetRouteTableAssociation,
        json!({
            "RouteTableId": route_table.reference(),
            "SubnetId": subnet.reference(),
        }),
    )?;

    Ok(SubnetHandle {
        subnet,
        route_table,
        zone_index,
    })
}
