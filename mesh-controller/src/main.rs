#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use mesh_controller_cds::ClusterBuilder;
use mesh_controller_core::Environment;
use mesh_controller_runtime::Args;
use std::sync::Arc;

/// Loads a declarative configuration stream, builds the cluster set for
/// the described proxy, and dumps it as JSON.
fn main() -> Result<()> {
    let args = Args::parse();
    args.init_logging()?;

    let input = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?;
    let set = mesh_controller_config::load(&input)?;

    let mut proxy = args.proxy();
    if let Some((name, namespace)) = args.scope_ref() {
        proxy.sidecar_scope = set.sidecar_scope(name, namespace).cloned();
        if proxy.sidecar_scope.is_none() {
            tracing::warn!(scope = ?args.sidecar_scope, "sidecar scope not found in the configuration stream");
        }
    }

    let push = set.push_context();
    let env = Environment {
        mesh: args.mesh(),
        discovery: Arc::new(set.registry),
    };

    let clusters = ClusterBuilder::new().build(&env, &proxy, &push);
    for event in push.events() {
        tracing::warn!(key = %event.key, proxy = %event.proxy_id, "{}", event.message);
    }

    println!("{}", serde_json::to_string_pretty(&clusters)?);
    Ok(())
}
