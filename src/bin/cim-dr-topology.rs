// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Composer
//!
//! Loads the configuration profile, composes and validates the topology and
//! prints the engine template on stdout.
//!
//! Run with: cargo run --bin cim-dr-topology
//!
//! Environment:
//! - `TOPOLOGY_CONFIG` - profile name (default `parameters`)
//! - `TOPOLOGY_CONFIG_DIR` - profile directory (default `./config`)
//! - `CDK_DEFAULT_ACCOUNT` / `CDK_DEFAULT_REGION` - target account and region
//! - `TOPOLOGY_DRY_RUN` - when set, also rehearse apply and teardown against
//!   a provider stand-in

use anyhow::{Context, Result};
use cim_dr_topology::{compose, config::STACK_NAME, ConfigSource, DeploymentEnv, DryRunApi, GraphExecutor};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays a clean template
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let source = ConfigSource::from_env();
    info!(profile = %source.profile, path = %source.path().display(), "loading configuration");
    let config = source
        .load()
        .with_context(|| format!("Failed to load configuration profile '{}'", source.profile))?;

    let env = DeploymentEnv::from_env();
    let topology = compose(&config, &env).context("Failed to compose topology")?;
    info!(stack = STACK_NAME, nodes = topology.graph.nodes().len(), "topology ready");

    if std::env::var("TOPOLOGY_DRY_RUN").is_ok() {
        let mut executor = GraphExecutor::new(DryRunApi::new(), DryRunApi::new());
        info!(run_id = %executor.run_id(), "dry-run rehearsal");
        let report = executor
            .apply(&topology.graph)
            .await
            .context("Dry-run apply failed")?;
        for (name, value) in &report.outputs {
            info!(output = %name, value = %value, "dry-run output");
        }
        executor
            .teardown(&topology.graph)
            .await
            .context("Dry-run teardown failed")?;
    }

    let template = serde_json::to_string_pretty(&topology.template()).context("Failed to render template")?;
    println!("{}", template);
    Ok(())
}
