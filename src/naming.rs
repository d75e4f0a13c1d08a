// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deterministic declaration identities
//!
//! Repeated declarations (one route per subnet, one propagation per route
//! table) get their identity from a pure function of base name and index.
//! There is no process-wide counter.

/// Identity of the `index`-th repetition of `base`
///
/// Distinct indices always produce distinct names for the same base.
pub fn name(base: &str, index: usize) -> String {
    format!("{}{}", base, index)
}

/// Render a scoped identity as an engine logical id
///
/// Keeps ASCII alphanumerics only, so `"VpnStack/CustomerGateway"` becomes
/// `"VpnStackCustomerGateway"`.
pub fn logical_id(scoped: &str) -> String {
    scoped.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
