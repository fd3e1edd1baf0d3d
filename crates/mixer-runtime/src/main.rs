//! # Mixer Runtime
//!
//! Composition root for the mixer backend: builds the Poseidon accumulator,
//! the JSON-RPC ledger source and the event indexer, runs the indexer until
//! a termination signal arrives, and exposes the read handle the HTTP layer
//! consumes.
//!
//! Every dependency is constructed here and injected explicitly; nothing in
//! the services reaches for process-global state.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mixer_indexer::{EventIndexerService, IndexerConfig, JsonRpcLedger, MixerReadApi};
use mixer_tree::{CommitmentTree, PoseidonTreeHasher};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("starting mixer backend");

    let config = IndexerConfig::from_env().context("loading indexer configuration")?;
    info!(
        rpc_url = %config.rpc_url,
        contract = %config.contract_address,
        confirmations = config.confirmations,
        "configuration loaded"
    );

    let tree = Arc::new(RwLock::new(CommitmentTree::new(
        config.tree_depth,
        PoseidonTreeHasher::new(),
    )));

    let ledger = Arc::new(
        JsonRpcLedger::new(
            &config.rpc_url,
            config.contract_address.clone(),
            config.poll_interval(),
        )
        .context("connecting to ledger endpoint")?,
    );

    let mut indexer = EventIndexerService::new(config, ledger, tree);
    if let Err(e) = indexer.start().await {
        error!(error = %e, "indexer startup failed");
        return Err(e).context("starting event indexer");
    }

    // The read handle the HTTP layer mounts its routes on.
    let reader = indexer.reader();
    info!(
        root = %reader.root_hex(),
        leaves = reader.leaf_count(),
        "accumulator ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(indexer.run(shutdown_rx));

    wait_for_termination().await;
    info!("shutting down gracefully");
    let _ = shutdown_tx.send(true);
    worker.await.context("joining indexer task")?;

    info!("mixer backend stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "cannot install SIGTERM handler; falling back to ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
