//! # Domain Entities
//!
//! The on-chain event the indexer consumes.

use mixer_tree::Fr;

use super::value_objects::EventId;

/// Transaction hash type alias (32-byte keccak digest).
pub type TxHash = [u8; 32];

/// One `LeafInserted` emission from the mixer contract.
///
/// The contract emits `(leafIndex, leaf, newRoot)`; the root is not carried
/// here because the accumulator recomputes every root locally and must not
/// trust the provider for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafInsertedEvent {
    /// Insertion index claimed by the contract.
    pub leaf_index: u64,
    /// The commitment value.
    pub leaf: Fr,
    /// Block the emitting transaction was included in.
    pub block_number: u64,
    /// Hash of the emitting transaction.
    pub transaction_hash: TxHash,
    /// Position of this log within the block.
    pub log_index: u64,
}

impl LeafInsertedEvent {
    /// Deduplication identity of this event instance.
    pub fn id(&self) -> EventId {
        EventId {
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
        }
    }
}
