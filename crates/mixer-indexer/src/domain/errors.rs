//! # Domain Errors
//!
//! Error taxonomy for the indexer. Provider faults are transient by policy:
//! they are absorbed and logged inside the live loop and repaired by the
//! next reconciliation pass. Only errors returned from startup are fatal.

use thiserror::Error;

/// Faults reported by a ledger source.
///
/// All of these are recoverable in steady state; the service never escalates
/// them once live.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transport-level RPC failure (connection refused, timeout, 5xx).
    #[error("rpc transport error: {0}")]
    Rpc(String),

    /// The provider answered with something we could not decode.
    #[error("malformed provider response: {0}")]
    Decode(String),

    /// The push subscription could not be established.
    #[error("subscription failed: {0}")]
    Subscription(String),
}

/// Indexer errors.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// No contract code at the configured address. Fatal at startup: the
    /// deployment is misconfigured and no amount of retrying will help.
    #[error("no contract code found at address {address}")]
    ContractNotFound {
        /// The configured contract address.
        address: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying provider fault.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Accumulator rejected an operation.
    #[error(transparent)]
    Tree(#[from] mixer_tree::TreeError),
}
