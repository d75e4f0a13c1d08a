// Copyright (c) 2025 - Cowboy AI, Inc.
//! Run Configuration
//!
//! A named profile (default `parameters`) resolves to `<dir>/<profile>.yaml`:
//!
//! ```yaml
//! AppName: edr-vpn
//! AWSSideVPC: 10.0.0.0/16
//! OnPremiseSideVPC: 192.168.0.0/16
//! NumberOfAZs: 2
//! ```
//!
//! All four fields are required. String fields must be non-blank. Every
//! check runs before any declaration begins.
//!
//! # Environment
//!
//! - `TOPOLOGY_CONFIG` - profile name
//! - `TOPOLOGY_CONFIG_DIR` - profile directory (default `./config`)
//! - `CDK_DEFAULT_ACCOUNT` / `CDK_DEFAULT_REGION` - target account and region

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{TopologyError, TopologyResult};

/// Default profile name
pub const DEFAULT_PROFILE: &str = "parameters";

/// Default profile directory
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Stack name of the provisioning run
pub const STACK_NAME: &str = "AWS-EDR-with-AWS-S2S-VPN";

/// Project tag applied to every taggable resource
pub const PROJECT_TAG: (&str, &str) = ("project", "EDR-with-VPN");

/// Configuration document as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfigDocument {
    #[serde(rename = "AppName")]
    app_name: Option<String>,
    #[serde(rename = "AWSSideVPC")]
    aws_side_vpc: Option<String>,
    #[serde(rename = "OnPremiseSideVPC")]
    on_premise_side_vpc: Option<String>,
    #[serde(rename = "NumberOfAZs")]
    number_of_azs: Option<i64>,
}

/// Validated configuration document
///
/// CIDR syntax and overlap are checked by the address space planner, which
/// owns the ranges; this type only guarantees the fields are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub app_name: String,
    pub aws_cidr_range: String,
    pub on_premise_cidr_range: String,
    pub number_of_azs: i64,
}

fn ensure_string(value: Option<String>, field: &str) -> TopologyResult<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(TopologyError::invalid_config(format!(
            "{} does not exist or is empty",
            field
        ))),
    }
}

fn ensure_number(value: Option<i64>, field: &str) -> TopologyResult<i64> {
    value.ok_or_else(|| TopologyError::invalid_config(format!("{} does not exist", field)))
}

impl BuildConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(document: &str) -> TopologyResult<Self> {
        let raw: RawConfigDocument = if document.trim().is_empty() {
            RawConfigDocument::default()
        } else {
            serde_yaml::from_str(document)?
        };

        Ok(Self {
            app_name: ensure_string(raw.app_name, "AppName")?,
            aws_cidr_range: ensure_string(raw.aws_side_vpc, "AWSSideVPC")?,
            on_premise_cidr_range: ensure_string(raw.on_premise_side_vpc, "OnPremiseSideVPC")?,
            number_of_azs: ensure_number(raw.number_of_azs, "NumberOfAZs")?,
        })
    }

    /// Read and validate a YAML file
    pub fn from_file(path: &Path) -> TopologyResult<Self> {
        let document = std::fs::read_to_string(path).map_err(|err| {
            TopologyError::invalid_config(format!("cannot read {}: {}", path.display(), err))
        })?;
        debug!(path = %path.display(), "configuration document read");
        Self::from_yaml_str(&document)
    }
}

/// Where the configuration profile lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub profile: String,
    pub dir: PathBuf,
}

impl ConfigSource {
    /// Resolve profile and directory from the environment
    pub fn from_env() -> Self {
        let profile = match std::env::var("TOPOLOGY_CONFIG") {
            Ok(profile) if !profile.trim().is_empty() => profile,
            _ => {
                warn!(
                    default = DEFAULT_PROFILE,
                    "no configuration profile provided, set TOPOLOGY_CONFIG=<name> to pick a file from the config directory"
                );
                DEFAULT_PROFILE.to_string()
            }
        };
        let dir = std::env::var("TOPOLOGY_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));

        Self { profile, dir }
    }

    /// Path of the profile document
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.yaml", self.profile))
    }

    /// Load and validate the profile
    pub fn load(&self) -> TopologyResult<BuildConfig> {
        BuildConfig::from_file(&self.path())
    }
}

/// Target account and region of the run
///
/// `None` leaves the choice to the provisioning engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentEnv {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl DeploymentEnv {
    /// Read `CDK_DEFAULT_ACCOUNT` / `CDK_DEFAULT_REGION`
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            account: read("CDK_DEFAULT_ACCOUNT"),
            region: read("CDK_DEFAULT_REGION"),
        }
    }

    /// Fixed account and region
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// Region as a template value
    pub fn region_value(&self) -> Value {
        match &self.region {
            Some(region) => json!(region),
            None => json!({ "Ref": "AWS::Region" }),
        }
    }

    /// Account as a template value
    pub fn account_value(&self) -> Value {
        match &self.account {
            Some(account) => json!(account),
            None => json!({ "Ref": "AWS::AccountId" }),
        }
    }

    /// `com.amazonaws.<region>.<service>` endpoint service name
    pub fn endpoint_service_name(&self, service: &str) -> Value {
        match &self.region {
            Some(region) => json!(format!("com.amazonaws.{}.{}", region, service)),
            None => json!({
                "Fn::Join": ["", ["com.amazonaws.", { "Ref": "AWS::Region" }, format!(".{}", service)]]
            }),
        }
    }
}
