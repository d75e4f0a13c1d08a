// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Domain Models
//!
//! Value objects with validation invariants for the address space shared by
//! the cloud-side and on-premise-side networks.
//!
//! # Value Objects with Invariants
//!
//! - [`CidrBlock`] - canonical IPv4 block, /16 to /28
//! - [`AvailabilityZoneCount`] - positive zone count
//! - [`AddressSpacePlan`] - both blocks plus zone count, non-overlapping

pub mod network;
pub mod plan;

pub use network::{AvailabilityZoneCount, CidrBlock, NetworkError};
pub use plan::{plan, AddressSpacePlan};
