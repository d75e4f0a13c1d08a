// Copyright (c) 2025 - Cowboy AI, Inc.
//! Disaster-recovery topology for the Composable Information Machine
//!
//! Declares a cloud-side network and an on-premise-simulating network joined
//! by a site-to-site VPN, as a typed resource dependency graph. The graph is
//! handed to an external provisioning engine (rendered as a template) or
//! walked by [`executor::GraphExecutor`] against provider collaborators.
//!
//! ```text
//! config ──> domain::plan ──> units::{cloud_side, on_prem_side, vpn} ──> graph
//!                                                                        │
//!                                          template  <───────────────────┤
//!                                          executor  <───────────────────┘
//! ```

pub mod composer;
pub mod config;
pub mod domain;
pub mod errors;
pub mod executor;
pub mod external;
pub mod graph;
pub mod naming;
pub mod state_machine;
pub mod units;

// Re-export commonly used types
pub use composer::{compose, Topology};
pub use config::{BuildConfig, ConfigSource, DeploymentEnv};
pub use domain::{plan, AddressSpacePlan, CidrBlock};
pub use errors::{TopologyError, TopologyResult};
pub use executor::{DryRunApi, GraphExecutor, ResourceApi};
pub use graph::{EdgeKind, NodeId, NodeRef, ResourceGraph, ResourceKind, Unit};
pub use state_machine::{ConnectionState, VpnLifecycleRecord};
