use anyhow::Result;
use clap::Parser;
use metrix_common::CollectionStore;
use metrix_storage::{open_backend, SnapshotScheduler};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use metrix_server::{app, lifecycle};
use metrix_server::config::{Cli, ServerConfig};
use metrix_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("metrix=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_cli(&cli)?;

    let store = Arc::new(CollectionStore::new());
    let backend = open_backend(&config.backend_choice(), config.database_options()).await?;

    lifecycle::restore_store(&store, backend.as_ref(), config.restore).await?;

    let cancel = CancellationToken::new();
    let scheduler = SnapshotScheduler::spawn_if_enabled(
        store.clone(),
        backend.clone(),
        config.store_interval(),
        cancel.clone(),
    );

    let state = AppState::new(store.clone(), backend.clone());
    let app = app::build_http_app(state);
    let listener = tokio::net::TcpListener::bind(&config.address).await?;
    tracing::info!(address = %config.address, "metrix-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await?;

    if let Err(e) = lifecycle::shutdown(&store, backend.as_ref(), &cancel, scheduler).await {
        tracing::error!(error = %e, "Final snapshot failed");
    }
    Ok(())
}
