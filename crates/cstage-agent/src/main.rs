mod config;

use anyhow::Result;
use cstage_common::types::Sample;
use cstage_engine::dispatcher::Dispatcher;
use cstage_engine::registry::RegistryBuilder;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cstage=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = config::AgentConfig::load(&config_path)?;
    tracing::info!(agent_id = %config.agent_id, "cstage-agent starting");

    let mut builder = RegistryBuilder::new();
    for entry in cstage_probe::catalog::all() {
        builder.register(entry.descriptor, entry.probe)?;
    }
    let registry = Arc::new(builder.build());
    tracing::info!(metrics = registry.len(), "Probe registry ready");

    if config.advertise_on_start {
        // One-time registration payload: the host learns every supported
        // key, its description and parameter schema.
        println!("{}", serde_json::to_string(&registry.descriptors())?);
    }

    let dispatcher = Dispatcher::new(registry, config.engine_config());
    let targets = config.collection_targets();
    let mut tick = interval(Duration::from_secs(config.collection_interval_secs));

    tracing::info!(
        interval_secs = config.collection_interval_secs,
        targets = targets.len(),
        "Starting collection loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                for target in &targets {
                    let outcome = dispatcher.collect(&target.key, &target.params).await;
                    if let Err(e) = &outcome {
                        tracing::warn!(key = %target.key, kind = e.kind(), error = %e, "Collection failed");
                    }
                    let sample = Sample::from_outcome(&target.key, &outcome);
                    match serde_json::to_string(&sample) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!(key = %target.key, error = %e, "Sample serialization failed"),
                    }
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}
