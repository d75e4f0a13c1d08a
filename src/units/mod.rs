// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployable Units
//!
//! Each unit declares its resources into the shared [`ResourceGraph`] under
//! its own scope and hands back typed handles. Consumers read those handles;
//! nothing a unit declares is mutated by another unit.
//!
//! ```text
//! AddressSpacePlan ──> CloudSideNetworkUnit ──┐
//!                 └──> OnPremSideNetworkUnit ─┴──> VpnInterconnectUnit
//! ```
//!
//! [`ResourceGraph`]: crate::graph::ResourceGraph

pub mod cloud_side;
pub mod compute;
pub mod endpoint;
pub mod on_prem_side;
pub mod vpc;
pub mod vpn;

use serde_json::Value;

pub use cloud_side::CloudSideNetworkUnit;
pub use compute::InstanceHandle;
pub use on_prem_side::OnPremSideNetworkUnit;
pub use vpc::{SubnetHandle, VpcHandle};
pub use vpn::{VpnInterconnectOutput, VpnInterconnectUnit};

/// Router addresses, on-prem side only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOutput {
    pub instance: InstanceHandle,
    pub public_address: Value,
    pub private_address: Value,
}

/// What a network unit hands to its consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkUnitOutput {
    /// Declared network, with route tables per subnet
    pub network: VpcHandle,
    /// Private address of the workload instance
    pub primary_instance_address: Value,
    pub router: Option<RouterOutput>,
}
