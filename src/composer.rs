// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Composer
//!
//! Wires the planner and the three units into one graph, tags it, publishes
//! the operator-facing outputs and validates the result.
//!
//! Planning runs first: a configuration error aborts before a single node is
//! declared.

use serde_json::{json, Value};
use tracing::info;

use crate::config::{BuildConfig, DeploymentEnv, PROJECT_TAG, STACK_NAME};
use crate::domain::{plan, AddressSpacePlan};
use crate::errors::{TopologyError, TopologyResult};
use crate::graph::ResourceGraph;
use crate::units::{
    CloudSideNetworkUnit, NetworkUnitOutput, OnPremSideNetworkUnit, VpnInterconnectOutput, VpnInterconnectUnit,
};

/// Published output names
pub mod outputs {
    pub const AWS_CIDR: &str = "AWS CIDR";
    pub const AWS_SERVER_PRIVATE_IP: &str = "AWS Server Private IP";
    pub const ON_PREMISE_CIDR: &str = "On-Premise CIDR";
    pub const ON_PREMISE_ROUTER_PUBLIC_IP: &str = "On-Premise Router Public IP";
    pub const ON_PREMISE_ROUTER_PRIVATE_IP: &str = "On-Premise Router Private IP";
    pub const ON_PREMISE_SERVER_PRIVATE_IP: &str = "On-Premise Server Private IP";
    pub const REGION: &str = "Region";
}

/// A composed, validated topology
#[derive(Debug, Clone)]
pub struct Topology {
    pub app_name: String,
    pub plan: AddressSpacePlan,
    pub graph: ResourceGraph,
    pub cloud: NetworkUnitOutput,
    pub on_prem: NetworkUnitOutput,
    pub vpn: VpnInterconnectOutput,
}

impl Topology {
    /// Engine template for the whole run
    pub fn template(&self) -> Value {
        self.graph
            .to_template(&format!("{} ({})", STACK_NAME, self.app_name))
    }
}

/// Compose the full topology from a validated configuration
pub fn compose(config: &BuildConfig, env: &DeploymentEnv) -> TopologyResult<Topology> {
    let plan = plan(
        &config.aws_cidr_range,
        &config.on_premise_cidr_range,
        config.number_of_azs,
    )?;
    info!(
        app = %config.app_name,
        cloud = %plan.cloud_cidr(),
        on_prem = %plan.on_prem_cidr(),
        zones = plan.az_count(),
        "address space planned"
    );

    let mut graph = ResourceGraph::new();
    let cloud = CloudSideNetworkUnit::new(&plan, env).build(&mut graph)?;
    let on_prem = OnPremSideNetworkUnit::new(&plan, env).build(&mut graph)?;
    let vpn = VpnInterconnectUnit::new(&cloud, &on_prem, env).build(&mut graph)?;

    let (key, value) = PROJECT_TAG;
    graph.tag_all(key, value);

    publish_outputs(&mut graph, &plan, &cloud, &on_prem, env)?;
    graph.validate()?;

    info!(
        stack = STACK_NAME,
        nodes = graph.nodes().len(),
        outputs = graph.outputs().len(),
        "topology composed"
    );

    Ok(Topology {
        app_name: config.app_name.clone(),
        plan,
        graph,
        cloud,
        on_prem,
        vpn,
    })
}

fn publish_outputs(
    graph: &mut ResourceGraph,
    plan: &AddressSpacePlan,
    cloud: &NetworkUnitOutput,
    on_prem: &NetworkUnitOutput,
    env: &DeploymentEnv,
) -> TopologyResult<()> {
    let router = on_prem
        .router
        .as_ref()
        .ok_or_else(|| TopologyError::declaration("OnPremiseSideStack", "no router declared"))?;

    graph.add_output(outputs::AWS_CIDR, json!(plan.cloud_cidr().as_str()))?;
    graph.add_output(outputs::AWS_SERVER_PRIVATE_IP, cloud.primary_instance_address.clone())?;
    graph.add_output(outputs::ON_PREMISE_CIDR, json!(plan.on_prem_cidr().as_str()))?;
    graph.add_output(outputs::ON_PREMISE_ROUTER_PUBLIC_IP, router.public_address.clone())?;
    graph.add_output(outputs::ON_PREMISE_ROUTER_PRIVATE_IP, router.private_address.clone())?;
    graph.add_output(outputs::ON_PREMISE_SERVER_PRIVATE_IP, on_prem.primary_instance_address.clone())?;
    graph.add_output(outputs::REGION, env.region_value())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(azs: i64) -> BuildConfig {
        BuildConfig {
            app_name: "edr-vpn".to_string(),
            aws_cidr_range: "10.0.0.0/16".to_string(),
            on_premise_cidr_range: "192.168.0.0/16".to_string(),
            number_of_azs: azs,
        }
    }

    #[test]
    fn test_compose_publishes_seven_outputs() {
        let topology = compose(&config(2), &DeploymentEnv::new("111122223333", "us-east-1")).unwrap();
        let names: Vec<&str> = topology.graph.outputs().iter().map(|o| o.name.as_str()).collect();

        assert_eq!(names.len(), 7);
        assert_eq!(names[0], outputs::AWS_CIDR);
        assert_eq!(names[6], outputs::REGION);
        assert_eq!(topology.graph.outputs()[6].value, json!("us-east-1"));
    }

    #[test]
    fn test_overlap_aborts_before_declaration() {
        let mut overlapping = config(2);
        overlapping.on_premise_cidr_range = "10.0.128.0/17".to_string();

        let err = compose(&overlapping, &DeploymentEnv::default()).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_project_tag_on_taggable_nodes() {
        let topology = compose(&config(1), &DeploymentEnv::default()).unwrap();
        let template = topology.template();
        let vpc = &template["Resources"]["AwsSideStackAwsVpc"]["Properties"]["Tags"];

        assert!(vpc
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["Key"] == "project" && t["Value"] == "EDR-with-VPN"));
        assert!(template["Description"]
            .as_str()
            .unwrap()
            .starts_with(STACK_NAME));
    }
}
