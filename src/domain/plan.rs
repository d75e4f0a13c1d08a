// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Space Planning
//!
//! The single source of truth for both network ranges and the zone count.
//! Both network units read the same validated [`AddressSpacePlan`], so there
//! is no second parse of the configuration anywhere downstream.
//!
//! # Rules
//!
//! 1. Both CIDRs present, non-blank, valid `/16`-`/28` IPv4 blocks
//! 2. The two blocks do not overlap
//! 3. Zone count is a positive integer
//!
//! Subnetting inside each block is left to the network declaration.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::network::{AvailabilityZoneCount, CidrBlock, NetworkError};
use crate::errors::{TopologyError, TopologyResult};

/// Validated address space shared by every unit
///
/// Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressSpacePlan {
    cloud_cidr: CidrBlock,
    on_prem_cidr: CidrBlock,
    az_count: AvailabilityZoneCount,
}

impl AddressSpacePlan {
    /// Cloud-side network range
    pub fn cloud_cidr(&self) -> &CidrBlock {
        &self.cloud_cidr
    }

    /// On-premise-side network range
    pub fn on_prem_cidr(&self) -> &CidrBlock {
        &self.on_prem_cidr
    }

    /// Number of availability zones (one public and one isolated subnet each)
    pub fn az_count(&self) -> usize {
        self.az_count.value()
    }
}

/// Validate a single CIDR field, naming it in the error
pub fn validate_cidr_field(field: &str, value: &str) -> TopologyResult<CidrBlock> {
    if value.trim().is_empty() {
        return Err(NetworkError::EmptyCidr(field.to_string()).into());
    }
    CidrBlock::new(value)
        .map_err(|err| TopologyError::invalid_config(format!("{}: {}", field, err)))
}

/// Validate that two ranges are disjoint
pub fn validate_disjoint(cloud: &CidrBlock, on_prem: &CidrBlock) -> TopologyResult<()> {
    if cloud.overlaps(on_prem) {
        return Err(NetworkError::Overlapping(cloud.as_str(), on_prem.as_str()).into());
    }
    Ok(())
}

/// Build the address space plan
///
/// Fails with `InvalidConfig` on an empty or malformed CIDR, overlapping
/// ranges, or a non-positive zone count.
pub fn plan(cloud_cidr: &str, on_prem_cidr: &str, az_count: i64) -> TopologyResult<AddressSpacePlan> {
    let cloud = validate_cidr_field("AWSSideVPC", cloud_cidr)?;
    let on_prem = validate_cidr_field("OnPremiseSideVPC", on_prem_cidr)?;

    if let Err(err) = validate_disjoint(&cloud, &on_prem) {
        warn!(cloud = %cloud, on_prem = %on_prem, "rejecting overlapping address spaces");
        return Err(err);
    }

    let az_count = AvailabilityZoneCount::new(az_count)
        .map_err(|err| TopologyError::invalid_config(format!("NumberOfAZs: {}", err)))?;

    debug!(cloud = %cloud, on_prem = %on_prem, az_count = %az_count, "address space planned");

    Ok(AddressSpacePlan {
        cloud_cidr: cloud,
        on_prem_cidr: on_prem,
        az_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_valid() {
        let plan = plan("10.0.0.0/16", "192.168.0.0/16", 2).unwrap();
        assert_eq!(plan.cloud_cidr().as_str(), "10.0.0.0/16");
        assert_eq!(plan.on_prem_cidr().as_str(), "192.168.0.0/16");
        assert_eq!(plan.az_count(), 2);
    }

    #[test]
    fn test_plan_empty_cidr() {
        let err = plan("", "192.168.0.0/16", 2).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("AWSSideVPC"));

        let err = plan("10.0.0.0/16", "   ", 2).unwrap_err();
        assert!(err.to_string().contains("OnPremiseSideVPC"));
    }

    #[test]
    fn test_plan_malformed_cidr() {
        let err = plan("10.0.0/16", "192.168.0.0/16", 2).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("AWSSideVPC"));
    }

    #[test]
    fn test_plan_rejects_non_canonical_spellings() {
        for cloud in ["10.0.0.0/+16", " 10.0.0.0/16", "10.0.0.0/016"] {
            let err = plan(cloud, "192.168.0.0/16", 2).unwrap_err();
            assert!(err.is_config_error(), "{:?}: {}", cloud, err);
        }
    }

    #[test]
    fn test_plan_overlapping() {
        let err = plan("10.0.0.0/16", "10.0.64.0/18", 2).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("overlap"));

        // Identical ranges overlap too
        assert!(plan("10.0.0.0/16", "10.0.0.0/16", 1).is_err());
    }

    #[test]
    fn test_plan_zone_count() {
        assert!(plan("10.0.0.0/16", "192.168.0.0/16", 0).is_err());
        assert!(plan("10.0.0.0/16", "192.168.0.0/16", -3).is_err());
        assert!(plan("10.0.0.0/16", "192.168.0.0/16", 6).is_ok());
    }
}
