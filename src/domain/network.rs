// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("CIDR for {0} is missing or empty")]
    EmptyCidr(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: /{0} (virtual network blocks must be /16 to /28)")]
    InvalidPrefixLength(u8),

    #[error("CIDR {given} has host bits set (network address is {network})")]
    HostBitsSet { given: String, network: String },

    #[error("CIDR ranges overlap: {0} and {1}")]
    Overlapping(String, String),

    #[error("Invalid availability zone count: {0} (must be a positive integer)")]
    InvalidZoneCount(i64),
}

/// IPv4 CIDR block value object
///
/// Represents the address space of one virtual network.
/// Invariants:
/// - Explicit `address/prefix` notation
/// - Prefix length within the virtual-network range (/16 to /28)
/// - Canonical: the address is the network address (no host bits)
///
/// # Examples
///
/// ```rust
/// use cim_dr_topology::domain::CidrBlock;
///
/// let block = CidrBlock::new("10.0.0.0/16").unwrap();
/// assert_eq!(block.prefix_length(), 16);
/// assert_eq!(block.as_str(), "10.0.0.0/16");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrBlock(Ipv4Network);

impl CidrBlock {
    /// Smallest prefix accepted for a virtual network
    pub const MIN_PREFIX: u8 = 16;

    /// Largest prefix accepted for a virtual network
    pub const MAX_PREFIX: u8 = 28;

    /// Parse and validate a CIDR block
    ///
    /// # Invariants
    /// - Non-empty, `a.b.c.d/n` notation with no surrounding whitespace
    /// - `n` is plain decimal digits, in 16..=28
    /// - no host bits set
    /// - the input is already the canonical spelling
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let raw = cidr.as_ref();

        let (addr_str, prefix_str) = raw
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(raw.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidCidr(raw.to_string()))?;

        if prefix_str.is_empty() || !prefix_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NetworkError::InvalidCidr(raw.to_string()));
        }
        let prefix = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(raw.to_string()))?;

        if !(Self::MIN_PREFIX..=Self::MAX_PREFIX).contains(&prefix) {
            return Err(NetworkError::InvalidPrefixLength(prefix));
        }

        let network = Ipv4Network::new(address, prefix)
            .map_err(|_| NetworkError::InvalidPrefixLength(prefix))?;

        // Invariant: canonical form
        if network.network() != address {
            return Err(NetworkError::HostBitsSet {
                given: raw.to_string(),
                network: format!("{}/{}", network.network(), prefix),
            });
        }

        // `/016` parses but does not round-trip
        if format!("{}/{}", address, prefix) != raw {
            return Err(NetworkError::InvalidCidr(raw.to_string()));
        }

        Ok(Self(network))
    }

    /// Network (base) address
    pub fn network_address(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// Prefix length
    pub fn prefix_length(&self) -> u8 {
        self.0.prefix()
    }

    /// Whether two blocks share any address
    pub fn overlaps(&self, other: &CidrBlock) -> bool {
        self.0.overlaps(other.0)
    }

    /// Whether an address falls inside the block
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.0.contains(address)
    }

    /// CIDR notation string
    pub fn as_str(&self) -> String {
        format!("{}/{}", self.0.network(), self.0.prefix())
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CidrBlock {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for CidrBlock {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for CidrBlock {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CidrBlock::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Availability zone count value object
///
/// Invariant: strictly positive. The regional upper bound is not known
/// locally; exceeding it surfaces as a declaration failure from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityZoneCount(u8);

impl AvailabilityZoneCount {
    /// Create a zone count with validation
    pub fn new(count: i64) -> Result<Self, NetworkError> {
        if count < 1 || count > i64::from(u8::MAX) {
            return Err(NetworkError::InvalidZoneCount(count));
        }
        Ok(Self(count as u8))
    }

    /// Get the count
    pub fn value(&self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for AvailabilityZoneCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for AvailabilityZoneCount {
    type Error = NetworkError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
