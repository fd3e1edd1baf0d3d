//! # Indexer Configuration
//!
//! Configuration for the event indexer service. Loaded from `MIXER_*`
//! environment variables by the runtime, or constructed directly in tests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{IndexerError, DEFAULT_CONFIRMATIONS};

/// Event indexer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Ledger JSON-RPC endpoint.
    pub rpc_url: String,

    /// Mixer contract address (`0x`-prefixed hex).
    pub contract_address: String,

    /// First block to backfill from. `None` locates the contract's
    /// deployment block by binary search.
    pub start_block: Option<u64>,

    /// Blocks a transaction must be buried under to count as settled.
    pub confirmations: u64,

    /// Accumulator depth; must match the withdrawal circuit.
    pub tree_depth: usize,

    /// Reconciliation period in milliseconds.
    pub sync_interval_ms: u64,

    /// Poll period for the push-subscription emulation, in milliseconds.
    pub poll_interval_ms: u64,

    /// Maximum block span per historical log query.
    pub backfill_chunk_size: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: String::new(),
            start_block: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            tree_depth: mixer_tree::DEFAULT_TREE_DEPTH,
            sync_interval_ms: 30_000,
            poll_interval_ms: 2_000,
            backfill_chunk_size: 10_000,
        }
    }
}

impl IndexerConfig {
    /// Load from `MIXER_RPC_URL`, `MIXER_CONTRACT_ADDRESS`,
    /// `MIXER_START_BLOCK`, `MIXER_CONFIRMATIONS` and
    /// `MIXER_SYNC_INTERVAL_MS`. A start block of 0 (or unset) means
    /// "locate the deployment block automatically".
    pub fn from_env() -> Result<Self, IndexerError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MIXER_RPC_URL") {
            config.rpc_url = url;
        }
        if let Ok(address) = std::env::var("MIXER_CONTRACT_ADDRESS") {
            config.contract_address = address;
        }
        if let Ok(raw) = std::env::var("MIXER_START_BLOCK") {
            let block = parse_env("MIXER_START_BLOCK", &raw)?;
            config.start_block = (block > 0).then_some(block);
        }
        if let Ok(raw) = std::env::var("MIXER_CONFIRMATIONS") {
            config.confirmations = parse_env("MIXER_CONFIRMATIONS", &raw)?;
        }
        if let Ok(raw) = std::env::var("MIXER_SYNC_INTERVAL_MS") {
            config.sync_interval_ms = parse_env("MIXER_SYNC_INTERVAL_MS", &raw)?;
        }

        if config.contract_address.is_empty() {
            return Err(IndexerError::Config(
                "MIXER_CONTRACT_ADDRESS is required".to_string(),
            ));
        }

        Ok(config)
    }

    /// Create a config for testing (small tree, fast timers).
    pub fn for_testing() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: "0x00000000000000000000000000000000000000aa".to_string(),
            start_block: None,
            confirmations: 2,
            tree_depth: 4,
            sync_interval_ms: 50,
            poll_interval_ms: 10,
            backfill_chunk_size: 16,
        }
    }

    /// Reconciliation period.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Subscription poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_env(name: &str, raw: &str) -> Result<u64, IndexerError> {
    raw.parse::<u64>()
        .map_err(|e| IndexerError::Config(format!("{name}={raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexerConfig::default();
        assert_eq!(config.confirmations, 6);
        assert_eq!(config.tree_depth, 30);
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert!(config.start_block.is_none());
    }

    #[test]
    fn test_testing_config_is_fast() {
        let config = IndexerConfig::for_testing();
        assert!(config.sync_interval() < Duration::from_secs(1));
        assert!(config.tree_depth < 10);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        assert!(parse_env("MIXER_CONFIRMATIONS", "six").is_err());
        assert_eq!(parse_env("MIXER_CONFIRMATIONS", "6").unwrap(), 6);
    }
}
