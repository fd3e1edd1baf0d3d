//! # Merkle Proof
//!
//! Inclusion proof for a single commitment, as handed to clients building
//! withdrawal proofs. The path layout matches the circuit's expectation:
//! one sibling per level from leaf to root, plus a side bit that is 1 when
//! the proven node is the right child at that level.

use ark_bn254::Fr;

use crate::hasher::TreeHasher;

/// Inclusion proof from a leaf to the accumulator root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// The proven commitment.
    pub leaf: Fr,
    /// Root the path folds up to.
    pub root: Fr,
    /// Sibling node per level, leaf level first.
    pub path_elements: Vec<Fr>,
    /// 1 when the proven node is the right child at that level, else 0.
    pub path_indices: Vec<u8>,
}

impl MerkleProof {
    /// Fold the path from the leaf and compare against the recorded root.
    ///
    /// A side bit of 1 means the running hash sits on the right, so the
    /// sibling goes first: `H(sibling, acc)`; otherwise `H(acc, sibling)`.
    pub fn verify<H: TreeHasher>(&self, hasher: &H) -> bool {
        if self.path_elements.len() != self.path_indices.len() {
            return false;
        }

        let mut acc = self.leaf;
        for (sibling, side) in self.path_elements.iter().zip(&self.path_indices) {
            acc = if *side == 1 {
                hasher.hash2(*sibling, acc)
            } else {
                hasher.hash2(acc, *sibling)
            };
        }

        acc == self.root
    }

    /// Depth of the tree this proof was generated from.
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::PoseidonTreeHasher;

    fn two_level_proof(hasher: &PoseidonTreeHasher) -> MerkleProof {
        // Tree over [a, b] at depth 2: root = H(H(a,b), H(0,0)).
        let a = Fr::from(10u64);
        let b = Fr::from(20u64);
        let zero = Fr::from(0u64);
        let z1 = hasher.hash2(zero, zero);
        let root = hasher.hash2(hasher.hash2(a, b), z1);
        MerkleProof {
            leaf: b,
            root,
            path_elements: vec![a, z1],
            path_indices: vec![1, 0],
        }
    }

    #[test]
    fn test_verify_valid_proof() {
        let hasher = PoseidonTreeHasher::new();
        let proof = two_level_proof(&hasher);
        assert!(proof.verify(&hasher));
    }

    #[test]
    fn test_verify_rejects_tampered_leaf() {
        let hasher = PoseidonTreeHasher::new();
        let mut proof = two_level_proof(&hasher);
        proof.leaf = Fr::from(999u64);
        assert!(!proof.verify(&hasher));
    }

    #[test]
    fn test_verify_rejects_tampered_sibling() {
        let hasher = PoseidonTreeHasher::new();
        let mut proof = two_level_proof(&hasher);
        proof.path_elements[0] = Fr::from(999u64);
        assert!(!proof.verify(&hasher));
    }

    #[test]
    fn test_verify_rejects_flipped_side() {
        let hasher = PoseidonTreeHasher::new();
        let mut proof = two_level_proof(&hasher);
        proof.path_indices[0] = 0;
        assert!(!proof.verify(&hasher));
    }

    #[test]
    fn test_verify_rejects_mismatched_lengths() {
        let hasher = PoseidonTreeHasher::new();
        let mut proof = two_level_proof(&hasher);
        proof.path_indices.pop();
        assert!(!proof.verify(&hasher));
    }
}
