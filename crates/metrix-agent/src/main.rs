mod config;
mod error;
mod sender;
mod transport;

use anyhow::Result;
use clap::Parser;
use metrix_collector::{default_collectors, Harvester};
use metrix_common::retry::RetryPolicy;
use metrix_common::CollectionStore;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{AgentConfig, Cli};
use crate::sender::Sender;
use crate::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("metrix=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = AgentConfig::from_cli(&cli)?;
    tracing::info!(
        address = %config.address,
        poll_interval_secs = config.poll_interval_secs,
        report_interval_secs = config.report_interval_secs,
        rate_limit = config.rate_limit,
        "metrix-agent starting"
    );

    let store = Arc::new(CollectionStore::new());
    let cancel = CancellationToken::new();

    let harvester = Harvester::new(store.clone(), default_collectors()?);
    let harvest_task = tokio::spawn(harvester.run(config.poll_interval(), cancel.clone()));

    let transport = HttpTransport::new(config.update_endpoint(), config.request_timeout())?;
    tracing::info!(endpoint = transport.endpoint(), "Reporting to server");
    let sender = Sender::new(
        store,
        Arc::new(transport),
        config.rate_limit,
        RetryPolicy::submission(),
    );
    let send_task = tokio::spawn(sender.run(config.report_interval(), cancel.clone()));

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");
    cancel.cancel();

    let (harvested, sent) = tokio::join!(harvest_task, send_task);
    harvested?;
    sent?;
    Ok(())
}
