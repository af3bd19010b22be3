mod client;
mod collector;
mod config;
mod handoff;
mod runtime;
mod sender;

use anyhow::Result;
use client::{GrpcClient, HttpClient, MetricClient};
use collector::Collector;
use handoff::Handoff;
use pulsemon_common::crypto;
use sender::Sender;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static ALLOCATOR: runtime::CountingAllocator = runtime::CountingAllocator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulsemon=info".parse()?))
        .init();

    let config = config::load()?;
    tracing::info!(
        server = %config.server_address,
        report_interval = config.report_interval,
        poll_interval = config.poll_interval,
        rate_limit = config.rate_limit,
        grpc = config.grpc_enabled,
        "pulsemon-agent starting"
    );

    let public_key = if config.crypto_key.is_empty() {
        None
    } else {
        Some(crypto::load_public_key(&config.crypto_key)?)
    };
    let key = if config.key.is_empty() {
        None
    } else {
        Some(config.key.clone())
    };

    let client: Arc<dyn MetricClient> = if config.grpc_enabled {
        Arc::new(GrpcClient::new(&config.server_address, key, public_key)?)
    } else {
        Arc::new(HttpClient::new(&config.server_address, key, public_key)?)
    };

    let collector = Arc::new(Collector::new());
    let handoff = Arc::new(Handoff::new());
    let poll_interval = Duration::from_secs(config.poll_interval);

    tokio::spawn(
        collector
            .clone()
            .run_runtime_poller(poll_interval, handoff.clone()),
    );
    tokio::spawn(collector.clone().run_system_poller(poll_interval));

    let sender = Sender::new(
        client,
        collector,
        config.rate_limit,
        Duration::from_secs(config.report_interval),
    );
    let sender_task = {
        let handoff = handoff.clone();
        tokio::spawn(async move { sender.run(handoff).await })
    };

    signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handoff.close();
    let _ = sender_task.await;

    Ok(())
}
