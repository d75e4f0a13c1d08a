// Copyright (c) 2025 - Cowboy AI, Inc.
//! Access rules, instance roles and instances

use serde_json::{json, Value};

use super::vpc::{SubnetHandle, VpcHandle};
use crate::domain::CidrBlock;
use crate::errors::TopologyResult;
use crate::graph::{NodeRef, ResourceGraph, ResourceKind, Unit};
use crate::naming::name;

/// Instance type of every workload and router instance
pub const INSTANCE_TYPE: &str = "t3.large";

/// Latest Amazon Linux 2 image, resolved by the engine
pub const MACHINE_IMAGE: &str =
    "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}";

/// Systems-manager core policy carried by every instance role
pub const SSM_CORE_POLICY: &str = "AmazonSSMManagedInstanceCore";

/// Disaster-recovery agent installation policy
pub const DRS_AGENT_INSTALLATION_POLICY: &str = "AWSElasticDisasterRecoveryAgentInstallationPolicy";

/// Disaster-recovery EC2 instance policy
pub const DRS_EC2_INSTANCE_POLICY: &str = "service-role/AWSElasticDisasterRecoveryEC2InstancePolicy";

/// Disaster-recovery agent control channel
pub const DRS_AGENT_PORT: u16 = 1500;

/// Traffic source of an ingress rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// An address range
    Ipv4(CidrBlock),
    /// Members of the same access rule
    SelfGroup,
}

/// Traffic matched by an ingress rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// ICMP echo request
    IcmpPing,
    Tcp(u16),
    AllTcp,
}

impl Port {
    fn properties(&self) -> Value {
        match self {
            Port::IcmpPing => json!({ "IpProtocol": "icmp", "FromPort": 8, "ToPort": -1 }),
            Port::Tcp(port) => json!({ "IpProtocol": "tcp", "FromPort": port, "ToPort": port }),
            Port::AllTcp => json!({ "IpProtocol": "tcp", "FromPort": 0, "ToPort": 65535 }),
        }
    }
}

/// One inbound rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub peer: Peer,
    pub port: Port,
    pub description: String,
}

impl IngressRule {
    pub fn new(peer: Peer, port: Port, description: &str) -> Self {
        Self {
            peer,
            port,
            description: description.to_string(),
        }
    }
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Value::Object(target), Value::Object(source)) = (&mut base, extra) {
        target.extend(source);
    }
    base
}

/// Declare an access rule (security group) with outbound traffic allowed
///
/// Range rules are inlined; self-referencing rules become separate ingress
/// declarations, since a group cannot reference itself before it exists.
pub fn declare_security_group(
    graph: &mut ResourceGraph,
    unit: Unit,
    id: &str,
    vpc: &VpcHandle,
    rules: &[IngressRule],
) -> TopologyResult<NodeRef> {
    let inline: Vec<Value> = rules
        .iter()
        .filter_map(|rule| match rule.peer {
            Peer::Ipv4(cidr) => Some(merge(
                json!({ "CidrIp": cidr.as_str(), "Description": rule.description }),
                rule.port.properties(),
            )),
            Peer::SelfGroup => None,
        })
        .collect();

    let group = graph.declare(
        unit,
        id,
        ResourceKind::SecurityGroup,
        json!({
            "GroupDescription": format!("{}/{}", unit, id),
            "VpcId": vpc.vpc_id(),
            "SecurityGroupIngress": inline,
            "SecurityGroupEgress": [{
                "CidrIp": "0.0.0.0/0",
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": "-1",
            }],
        }),
    )?;

    let self_rules = rules.iter().filter(|rule| rule.peer == Peer::SelfGroup);
    for (index, rule) in self_rules.enumerate() {
        graph.declare(
            unit,
            &name(&format!("{}SelfIngress", id), index),
            ResourceKind::SecurityGroupIngress,
            merge(
                json!({
                    "GroupId": group.attribute("GroupId"),
                    "SourceSecurityGroupId": group.attribute("GroupId"),
                    "Description": rule.description,
                }),
                rule.port.properties(),
            ),
        )?;
    }

    Ok(group)
}

/// ARN of a provider-managed policy
fn managed_policy_arn(policy: &str) -> Value {
    json!({
        "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, format!(":iam::aws:policy/{}", policy)]]
    })
}

/// Declare a role assumable by instances
pub fn declare_instance_role(
    graph: &mut ResourceGraph,
    unit: Unit,
    id: &str,
    managed_policies: &[&str],
) -> TopologyResult<NodeRef> {
    let arns: Vec<Value> = managed_policies.iter().map(|p| managed_policy_arn(p)).collect();
    graph.declare(
        unit,
        id,
        ResourceKind::IamRole,
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": "ec2.amazonaws.com" },
                }],
            },
            "ManagedPolicyArns": arns,
        }),
    )
}

/// What instance to declare
#[derive(Debug, Clone)]
pub struct InstanceSpec<'a> {
    pub id: &'a str,
    /// `Name` tag
    pub display_name: &'a str,
    pub subnet: &'a SubnetHandle,
    pub security_group: &'a NodeRef,
    pub role: &'a NodeRef,
    /// `false` lets the instance forward traffic it neither sends nor receives
    pub source_dest_check: bool,
}

/// A declared instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    pub instance: NodeRef,
}

impl InstanceHandle {
    /// Instance identifier
    pub fn instance_id(&self) -> Value {
        self.instance.reference()
    }

    /// Private address
    pub fn private_ip(&self) -> Value {
        self.instance.attribute("PrivateIp")
    }

    /// Public address (public subnets only)
    pub fn public_ip(&self) -> Value {
        self.instance.attribute("PublicIp")
    }
}

/// Declare an instance with its instance profile
pub fn declare_instance(graph: &mut ResourceGraph, unit: Unit, spec: &InstanceSpec<'_>) -> TopologyResult<InstanceHandle> {
    let profile = graph.declare(
        unit,
        &format!("{}InstanceProfile", spec.id),
        ResourceKind::InstanceProfile,
        json!({ "Roles": [spec.role.reference()] }),
    )?;

    let instance = graph.declare(
        unit,
        spec.id,
        ResourceKind::Instance,
        json!({
            "AvailabilityZone": { "Fn::GetAtt": [spec.subnet.subnet.id().as_str(), "AvailabilityZone"] },
            "IamInstanceProfile": profile.reference(),
            "ImageId": MACHINE_IMAGE,
            "InstanceType": INSTANCE_TYPE,
            "SecurityGroupIds": [spec.security_group.attribute("GroupId")],
            "SourceDestCheck": spec.source_dest_check,
            "SubnetId": spec.subnet.subnet_id(),
        }),
    )?;
    graph.tag(&instance, "Name", spec.display_name)?;
    // Role policies must be attached before the instance boots
    graph.add_dependency(&instance, spec.role)?;

    Ok(InstanceHandle { instance })
}
