//! # Mixer Indexer
//!
//! Event indexer keeping the commitment accumulator converged with the
//! mixer contract's on-chain log.
//!
//! ## Ingestion model
//!
//! Three paths feed the accumulator, all serialized through one writer task:
//!
//! - **Backfill** replays confirmed history once at startup.
//! - **Push** applies optimistic live events the moment they arrive.
//! - **Reconciliation** re-queries the confirmed range past the cursor on a
//!   fixed interval and is the sole guarantee of eventual convergence —
//!   anything the push path drops is applied here, in emission order.
//!
//! Every event is identified by `(transaction hash, log index)` and applied
//! at most once. The block cursor never moves backwards.
//!
//! ## Module Structure
//!
//! ```text
//! mixer-indexer/
//! ├── domain/          # Event shapes, dedup identity, errors, invariants
//! ├── ports/           # Read API (inbound) + ledger source (outbound)
//! ├── application/     # EventIndexerService + TreeReader
//! ├── adapters/        # Ethereum JSON-RPC ledger source
//! └── config.rs        # IndexerConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::JsonRpcLedger;
pub use application::{EventIndexerService, TreeReader};
pub use config::IndexerConfig;
pub use domain::{
    EventId, IndexerError, IndexerPhase, IndexerStatus, LeafInsertedEvent, LedgerError,
    MerkleProofResponse, MerkleTreeData, DEFAULT_CONFIRMATIONS,
};
pub use ports::{LedgerNotification, LedgerSource, LedgerSubscription, MixerReadApi, MockLedger};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
