// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-dr-topology
//!
//! Deterministic configuration documents, environments and fake provider
//! collaborators shared by the integration tests.
//!
//! # Design Principles
//! - Fixed account, region and address ranges
//! - Fakes record what they were asked and never touch a network

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

use cim_dr_topology::config::{BuildConfig, DeploymentEnv};
use cim_dr_topology::executor::{DryRunApi, ProvisionedResource, ResolvedResource, ResourceApi};
use cim_dr_topology::external::{ApiError, ResourceActionApi, SdkCall};

pub const ACCOUNT: &str = "111122223333";
pub const REGION: &str = "us-east-1";
pub const AWS_CIDR: &str = "10.0.0.0/16";
pub const ON_PREM_CIDR: &str = "192.168.0.0/16";

/// A complete, valid configuration document
pub const PARAMETERS_YAML: &str = "\
AppName: edr-vpn
AWSSideVPC: 10.0.0.0/16
OnPremiseSideVPC: 192.168.0.0/16
NumberOfAZs: 2
";

/// Valid configuration with `azs` zones
pub fn build_config(azs: i64) -> BuildConfig {
    BuildConfig {
        app_name: "edr-vpn".to_string(),
        aws_cidr_range: AWS_CIDR.to_string(),
        on_premise_cidr_range: ON_PREM_CIDR.to_string(),
        number_of_azs: azs,
    }
}

/// Fixed deployment target
pub fn deployment_env() -> DeploymentEnv {
    DeploymentEnv::new(ACCOUNT, REGION)
}

/// Action API whose calls all fail
#[derive(Debug, Default)]
pub struct RejectingActionApi {
    pub invocations: AtomicUsize,
}

#[async_trait]
impl ResourceActionApi for RejectingActionApi {
    async fn invoke(&self, call: &SdkCall) -> Result<Value, ApiError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::Rejected(format!("{} denied", call.action)))
    }
}

/// Action API that creates through a dry run but fails every delete
#[derive(Debug, Default)]
pub struct FailingDeleteActionApi {
    inner: DryRunApi,
}

#[async_trait]
impl ResourceActionApi for FailingDeleteActionApi {
    async fn invoke(&self, call: &SdkCall) -> Result<Value, ApiError> {
        if call.action.starts_with("delete") {
            return Err(ApiError::Timeout(call.action.clone()));
        }
        self.inner.invoke(call).await
    }
}

/// Resource API that rejects one resource kind
#[derive(Debug)]
pub struct RejectingResourceApi {
    pub reject_type: &'static str,
    inner: DryRunApi,
}

impl RejectingResourceApi {
    pub fn new(reject_type: &'static str) -> Self {
        Self {
            reject_type,
            inner: DryRunApi::new(),
        }
    }
}

#[async_trait]
impl ResourceApi for RejectingResourceApi {
    async fn create(&self, resource: &ResolvedResource) -> Result<ProvisionedResource, ApiError> {
        if resource.kind.type_name() == self.reject_type {
            return Err(ApiError::Rejected(format!("{} not available", self.reject_type)));
        }
        self.inner.create(resource).await
    }

    async fn delete(&self, resource: &ResolvedResource, physical_id: &str) -> Result<(), ApiError> {
        self.inner.delete(resource, physical_id).await
    }
}
