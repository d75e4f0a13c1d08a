// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Topology Composition

use cim_dr_topology::composer::compose;
use cim_dr_topology::config::{BuildConfig, DeploymentEnv};
use cim_dr_topology::graph::{EdgeKind, ResourceKind, Unit};
use proptest::prelude::*;
use std::collections::HashSet;

fn config(azs: i64) -> BuildConfig {
    BuildConfig {
        app_name: "edr-vpn".to_string(),
        aws_cidr_range: "10.0.0.0/16".to_string(),
        on_premise_cidr_range: "192.168.0.0/16".to_string(),
        number_of_azs: azs,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// One uniquely named route entry per isolated on-prem subnet
    #[test]
    fn prop_route_entries_unique(azs in 1i64..=8) {
        let topology = compose(&config(azs), &DeploymentEnv::default()).unwrap();
        let routes: Vec<_> = topology
            .graph
            .nodes_of_kind(ResourceKind::Route)
            .filter(|n| n.unit == Unit::OnPremSide)
            .filter(|n| n.rendered_properties().get("InstanceId").is_some())
            .collect();

        prop_assert_eq!(routes.len(), azs as usize);
        let ids: HashSet<&str> = routes.iter().map(|r| r.id.as_str()).collect();
        prop_assert_eq!(ids.len(), routes.len());
    }

    /// Every propagation is gated on the VPN connection for any zone count
    #[test]
    fn prop_propagations_gated(azs in 1i64..=8) {
        let topology = compose(&config(azs), &DeploymentEnv::default()).unwrap();
        let connection = topology.vpn.connection.id();

        prop_assert_eq!(topology.vpn.propagations.len(), 2 * azs as usize);
        for propagation in &topology.vpn.propagations {
            prop_assert!(topology.graph.has_edge(propagation.id(), connection, EdgeKind::Explicit));
        }
    }
}
