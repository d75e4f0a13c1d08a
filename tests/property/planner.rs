// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Address Planning

use cim_dr_topology::domain::plan;
use proptest::prelude::*;
use std::net::Ipv4Addr;

fn mask(prefix: u8) -> u32 {
    u32::MAX << (32 - prefix as u32)
}

/// Canonical block as (network address, prefix)
fn block() -> impl Strategy<Value = (u32, u8)> {
    (any::<u32>(), 16u8..=28).prop_map(|(address, prefix)| (address & mask(prefix), prefix))
}

fn render((address, prefix): (u32, u8)) -> String {
    format!("{}/{}", Ipv4Addr::from(address), prefix)
}

fn last_address((address, prefix): (u32, u8)) -> u32 {
    address | !mask(prefix)
}

fn disjoint(a: (u32, u8), b: (u32, u8)) -> bool {
    last_address(a) < b.0 || last_address(b) < a.0
}

proptest! {
    /// Planned fields equal the validated inputs exactly
    #[test]
    fn prop_plan_preserves_inputs(cloud in block(), on_prem in block(), azs in 1i64..=6) {
        prop_assume!(disjoint(cloud, on_prem));

        let planned = plan(&render(cloud), &render(on_prem), azs).unwrap();
        prop_assert_eq!(planned.cloud_cidr().as_str(), render(cloud));
        prop_assert_eq!(planned.on_prem_cidr().as_str(), render(on_prem));
        prop_assert_eq!(planned.az_count(), azs as usize);

        // Planning again gives the same plan
        let again = plan(&planned.cloud_cidr().as_str(), &planned.on_prem_cidr().as_str(), azs).unwrap();
        prop_assert_eq!(planned, again);
    }

    /// A block nested in the other is always rejected, in either position
    #[test]
    fn prop_nested_blocks_rejected(outer in block(), offset in any::<u32>(), extra in 0u8..=12) {
        let inner_prefix = (outer.1 + extra).min(28);
        let inner_address = (outer.0 | (offset & !mask(outer.1))) & mask(inner_prefix);
        let inner = (inner_address, inner_prefix);

        let err = plan(&render(outer), &render(inner), 2).unwrap_err();
        prop_assert!(err.is_config_error());
        let err = plan(&render(inner), &render(outer), 2).unwrap_err();
        prop_assert!(err.is_config_error());
    }

    /// Non-positive zone counts never plan
    #[test]
    fn prop_non_positive_zone_count_rejected(azs in i64::MIN..=0) {
        let err = plan("10.0.0.0/16", "192.168.0.0/16", azs).unwrap_err();
        prop_assert!(err.is_config_error());
    }

    /// Addresses with host bits set are rejected
    #[test]
    fn prop_host_bits_rejected(base in block(), bits in any::<u32>()) {
        let host = bits & !mask(base.1);
        prop_assume!(host != 0);
        let given = format!("{}/{}", Ipv4Addr::from(base.0 | host), base.1);

        let err = plan(&given, "192.168.0.0/16", 1);
        prop_assert!(err.is_err());
    }
}
