//! # Indexer Domain
//!
//! Core types for event ingestion: the on-chain event shape, deduplication
//! identity, lifecycle phases, read-API payloads, errors, and the small set
//! of ordering/retention rules the service must uphold.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use entities::{LeafInsertedEvent, TxHash};
pub use errors::{IndexerError, LedgerError};
pub use invariants::{
    advance_cursor, confirmed_ceiling, dedup_retention_floor, in_emission_order,
    DEFAULT_CONFIRMATIONS,
};
pub use value_objects::{
    EventId, IndexerPhase, IndexerStatus, MerkleProofResponse, MerkleTreeData,
};
