//! # Tree Read API
//!
//! Read-only view over the shared accumulator, handed to the HTTP layer.
//! Each call takes the read lock once, so responses are consistent
//! snapshots even while the indexer is applying events.

use std::sync::Arc;

use parking_lot::RwLock;

use mixer_tree::encoding::fr_to_hex;
use mixer_tree::{CommitmentTree, TreeHasher};

use crate::domain::{IndexerError, MerkleProofResponse, MerkleTreeData};
use crate::ports::inbound::MixerReadApi;

/// Shared-tree implementation of [`MixerReadApi`].
pub struct TreeReader<H: TreeHasher> {
    tree: Arc<RwLock<CommitmentTree<H>>>,
}

impl<H: TreeHasher> TreeReader<H> {
    /// Create a reader over the indexer's tree handle.
    pub fn new(tree: Arc<RwLock<CommitmentTree<H>>>) -> Self {
        Self { tree }
    }
}

impl<H: TreeHasher> Clone for TreeReader<H> {
    fn clone(&self) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
        }
    }
}

impl<H: TreeHasher> MixerReadApi for TreeReader<H> {
    fn root_hex(&self) -> String {
        fr_to_hex(&self.tree.read().root())
    }

    fn all_leaves(&self) -> Vec<String> {
        self.tree.read().leaves().iter().map(fr_to_hex).collect()
    }

    fn leaf_count(&self) -> u64 {
        self.tree.read().leaf_count()
    }

    fn merkle_proof(&self, index: u64) -> Result<MerkleProofResponse, IndexerError> {
        let tree = self.tree.read();
        let proof = tree.proof(index)?;
        Ok(MerkleProofResponse {
            path_elements: proof.path_elements.iter().map(fr_to_hex).collect(),
            path_indices: proof.path_indices,
            root: fr_to_hex(&proof.root),
            leaf: fr_to_hex(&proof.leaf),
            leaf_index: index,
        })
    }

    fn tree_data(&self) -> MerkleTreeData {
        let tree = self.tree.read();
        MerkleTreeData {
            leaves: tree.leaves().iter().map(fr_to_hex).collect(),
            root: fr_to_hex(&tree.root()),
            depth: tree.depth(),
            total_leaves: tree.leaf_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixer_tree::encoding::fr_from_hex;
    use mixer_tree::{Fr, PoseidonTreeHasher};

    fn reader_with_leaves(leaves: &[u64]) -> TreeReader<PoseidonTreeHasher> {
        let mut tree = CommitmentTree::new(4, PoseidonTreeHasher::new());
        for v in leaves {
            tree.add_leaf(Fr::from(*v)).unwrap();
        }
        TreeReader::new(Arc::new(RwLock::new(tree)))
    }

    #[test]
    fn test_empty_tree_reads() {
        let reader = reader_with_leaves(&[]);
        assert_eq!(reader.leaf_count(), 0);
        assert!(reader.all_leaves().is_empty());
        assert!(reader.root_hex().starts_with("0x"));
    }

    #[test]
    fn test_leaves_round_trip_through_hex() {
        let reader = reader_with_leaves(&[11, 22]);
        let leaves = reader.all_leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(fr_from_hex(&leaves[0]).unwrap(), Fr::from(11u64));
        assert_eq!(fr_from_hex(&leaves[1]).unwrap(), Fr::from(22u64));
    }

    #[test]
    fn test_proof_response_matches_tree() {
        let reader = reader_with_leaves(&[11, 22, 33]);
        let resp = reader.merkle_proof(1).unwrap();
        assert_eq!(resp.leaf_index, 1);
        assert_eq!(resp.path_elements.len(), 4);
        assert_eq!(resp.path_indices.len(), 4);
        assert_eq!(resp.root, reader.root_hex());
        assert_eq!(fr_from_hex(&resp.leaf).unwrap(), Fr::from(22u64));
    }

    #[test]
    fn test_proof_out_of_range_propagates() {
        let reader = reader_with_leaves(&[11]);
        assert!(matches!(
            reader.merkle_proof(5),
            Err(IndexerError::Tree(_))
        ));
    }

    #[test]
    fn test_tree_data_snapshot() {
        let reader = reader_with_leaves(&[11, 22]);
        let data = reader.tree_data();
        assert_eq!(data.depth, 4);
        assert_eq!(data.total_leaves, 2);
        assert_eq!(data.leaves.len(), 2);
        assert_eq!(data.root, reader.root_hex());
    }
}
