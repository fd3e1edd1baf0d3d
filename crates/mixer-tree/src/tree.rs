//! # Commitment Tree
//!
//! Fixed-depth append-only Merkle accumulator over the on-chain commitment
//! sequence.
//!
//! The tree models an infinite sparse structure: every unpopulated node at
//! level `l` has the precomputed value `zero[l]`, where `zero[0] = 0` and
//! `zero[l] = H(zero[l-1], zero[l-1])`. Appending a leaf therefore only
//! touches the `depth` nodes on its path to the root.

use ark_bn254::Fr;

use crate::errors::TreeError;
use crate::hasher::TreeHasher;
use crate::proof::MerkleProof;

/// Production tree depth, matching the withdrawal circuit.
pub const DEFAULT_TREE_DEPTH: usize = 30;

/// Append-only Merkle accumulator with zero-hash padding.
///
/// Single-writer: callers must serialize mutation externally. Reads are
/// consistent between mutations.
pub struct CommitmentTree<H: TreeHasher> {
    depth: usize,
    capacity: u64,
    hasher: H,
    /// `zero[l]` is the value of an empty subtree rooted at level `l`.
    zero: Vec<Fr>,
    /// `levels[0]` holds the leaves; `levels[depth]` holds at most the root.
    levels: Vec<Vec<Fr>>,
}

impl<H: TreeHasher> CommitmentTree<H> {
    /// Create an empty tree, precomputing the zero-hash table bottom-up.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is outside `1..=32`.
    pub fn new(depth: usize, hasher: H) -> Self {
        assert!(
            (1..=32).contains(&depth),
            "tree depth must be between 1 and 32"
        );

        let mut zero = Vec::with_capacity(depth + 1);
        let mut z = Fr::from(0u64);
        zero.push(z);
        for _ in 1..=depth {
            z = hasher.hash2(z, z);
            zero.push(z);
        }

        Self {
            depth,
            capacity: 1u64 << depth,
            hasher,
            zero,
            levels: vec![Vec::new(); depth + 1],
        }
    }

    /// Tree depth (number of hashing levels).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Maximum number of leaves (`2^depth`).
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of inserted leaves.
    pub fn leaf_count(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// All inserted leaves in insertion order.
    pub fn leaves(&self) -> &[Fr] {
        &self.levels[0]
    }

    /// Whether `leaf` has been inserted.
    pub fn contains(&self, leaf: &Fr) -> bool {
        self.index_of(leaf).is_some()
    }

    /// Insertion index of `leaf`, if present.
    pub fn index_of(&self, leaf: &Fr) -> Option<u64> {
        self.levels[0].iter().position(|l| l == leaf).map(|i| i as u64)
    }

    /// Current root: `zero[depth]` while the tree is empty.
    pub fn root(&self) -> Fr {
        self.levels[self.depth]
            .first()
            .copied()
            .unwrap_or(self.zero[self.depth])
    }

    /// Append a leaf and recompute its root path. Returns the new leaf's
    /// insertion index.
    pub fn add_leaf(&mut self, leaf: Fr) -> Result<u64, TreeError> {
        let index = self.leaf_count();
        if index >= self.capacity {
            return Err(TreeError::Full {
                capacity: self.capacity,
            });
        }

        self.levels[0].push(leaf);
        self.update_path(index as usize);
        Ok(index)
    }

    /// Append several leaves in order. Stops at the first failure.
    pub fn add_leaves<I>(&mut self, leaves: I) -> Result<(), TreeError>
    where
        I: IntoIterator<Item = Fr>,
    {
        for leaf in leaves {
            self.add_leaf(leaf)?;
        }
        Ok(())
    }

    /// Replace the whole leaf set and rebuild every level from scratch.
    ///
    /// Produces the same root as inserting `leaves` one by one into a fresh
    /// tree; used for bootstrap and recovery.
    pub fn rebuild_from_leaves(&mut self, leaves: Vec<Fr>) -> Result<(), TreeError> {
        if leaves.len() as u64 > self.capacity {
            return Err(TreeError::Full {
                capacity: self.capacity,
            });
        }

        self.levels = vec![Vec::new(); self.depth + 1];
        self.levels[0] = leaves;

        for level in 0..self.depth {
            let parents = self.levels[level].len().div_ceil(2);
            let mut next = Vec::with_capacity(parents);
            for parent in 0..parents {
                let left = self.node(level, 2 * parent);
                let right = self.node(level, 2 * parent + 1);
                next.push(self.hasher.hash2(left, right));
            }
            self.levels[level + 1] = next;
        }

        Ok(())
    }

    /// Inclusion proof for the leaf at `index`.
    ///
    /// Walks from the leaf to the root, recording the real sibling where one
    /// exists and the level's zero hash otherwise.
    pub fn proof(&self, index: u64) -> Result<MerkleProof, TreeError> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(TreeError::IndexOutOfRange { index, leaf_count });
        }

        let mut idx = index as usize;
        let mut path_elements = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);

        for level in 0..self.depth {
            path_elements.push(self.node(level, idx ^ 1));
            path_indices.push((idx & 1) as u8);
            idx >>= 1;
        }

        Ok(MerkleProof {
            leaf: self.levels[0][index as usize],
            root: self.root(),
            path_elements,
            path_indices,
        })
    }

    /// Node value at `(level, index)`, falling back to the zero hash for
    /// unpopulated positions.
    fn node(&self, level: usize, index: usize) -> Fr {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zero[level])
    }

    /// Recompute the path from leaf `index` up to the root.
    fn update_path(&mut self, index: usize) {
        let mut idx = index;
        for level in 0..self.depth {
            let parent = idx / 2;
            let left = self.node(level, 2 * parent);
            let right = self.node(level, 2 * parent + 1);
            let parent_hash = self.hasher.hash2(left, right);

            let next = &mut self.levels[level + 1];
            if parent < next.len() {
                next[parent] = parent_hash;
            } else {
                next.push(parent_hash);
            }
            idx = parent;
        }
    }
}
