//! # Mixer Tree
//!
//! Poseidon Merkle commitment accumulator for the mixer backend.
//!
//! The tree mirrors the on-chain commitment set: an append-only sequence of
//! BN254 field elements under a fixed-depth (30) binary Poseidon tree, with
//! unpopulated subtrees padded by precomputed zero hashes. Clients fetch
//! inclusion proofs from it to build withdrawal proofs, so every node value
//! must be bit-exactly reproducible from the leaf sequence alone.
//!
//! ## Components
//!
//! - `hasher` - the 2-ary hash seam and its Poseidon implementation
//! - `tree` - [`CommitmentTree`], the accumulator itself
//! - `proof` - [`MerkleProof`] generation output and verification fold
//! - `encoding` - field-element hex/byte conversions for the read API
//! - `errors` - [`TreeError`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod errors;
pub mod hasher;
pub mod proof;
pub mod tree;

pub use ark_bn254::Fr;
pub use errors::TreeError;
pub use hasher::{PoseidonTreeHasher, TreeHasher};
pub use proof::MerkleProof;
pub use tree::{CommitmentTree, DEFAULT_TREE_DEPTH};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
