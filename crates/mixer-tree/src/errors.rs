//! Accumulator error types.

use thiserror::Error;

/// Commitment tree errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Proof requested for a leaf index that has not been inserted.
    #[error("leaf index {index} out of range: tree holds {leaf_count} leaves")]
    IndexOutOfRange {
        /// Requested leaf index
        index: u64,
        /// Current number of leaves
        leaf_count: u64,
    },

    /// Insertion would exceed the fixed tree capacity.
    #[error("tree is full: capacity {capacity} leaves")]
    Full {
        /// Maximum leaf count (2^depth)
        capacity: u64,
    },

    /// A hex string could not be decoded into a field element.
    #[error("invalid field element encoding: {0}")]
    InvalidEncoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_range_display() {
        let err = TreeError::IndexOutOfRange {
            index: 7,
            leaf_count: 3,
        };
        assert!(err.to_string().contains('7'));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_full_display() {
        let err = TreeError::Full { capacity: 4 };
        assert!(err.to_string().contains("capacity 4"));
    }
}
