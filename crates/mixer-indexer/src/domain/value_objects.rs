//! # Domain Value Objects
//!
//! Immutable value types: deduplication keys, lifecycle phases, status
//! snapshots, and the serialized payloads served to the HTTP layer.

use serde::{Deserialize, Serialize};

use super::entities::TxHash;

/// Unique identity of one on-chain event instance.
///
/// The set of recorded ids only ever grows (modulo retention pruning of
/// settled history); an id, once recorded, is never applied again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId {
    /// Hash of the emitting transaction.
    pub transaction_hash: TxHash,
    /// Position of the log within its block.
    pub log_index: u64,
}

/// Indexer lifecycle phase.
///
/// A freshly constructed service reports `Backfilling`; `Live` is the
/// steady state and is never left except through process shutdown.
/// `Failed` is terminal and only reachable from startup errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerPhase {
    /// Replaying historical logs up to the confirmation ceiling.
    Backfilling,
    /// Subscribed to pushes with periodic reconciliation.
    Live,
    /// Unrecoverable startup failure.
    Failed,
}

/// Point-in-time indexer status for logging and diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerStatus {
    /// Current lifecycle phase.
    pub phase: IndexerPhase,
    /// Highest block whose events are guaranteed applied.
    pub last_processed_block: u64,
    /// Number of commitments in the accumulator.
    pub leaf_count: u64,
    /// Current accumulator root, hex encoded.
    pub root: String,
}

/// Inclusion-proof payload served to withdrawing clients.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProofResponse {
    /// Sibling hashes, leaf level first, hex encoded.
    pub path_elements: Vec<String>,
    /// 1 where the proven node is the right child, else 0.
    pub path_indices: Vec<u8>,
    /// Root the path folds to, hex encoded.
    pub root: String,
    /// The proven commitment, hex encoded.
    pub leaf: String,
    /// Insertion index of the proven commitment.
    pub leaf_index: u64,
}

/// Full tree snapshot served for client-side proof construction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MerkleTreeData {
    /// All commitments in insertion order, hex encoded.
    pub leaves: Vec<String>,
    /// Current root, hex encoded.
    pub root: String,
    /// Tree depth.
    pub depth: usize,
    /// Number of commitments.
    pub total_leaves: u64,
}
