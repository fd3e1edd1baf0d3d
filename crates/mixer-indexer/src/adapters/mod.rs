//! # Adapters
//!
//! Concrete implementations of the outbound ports.

pub mod json_rpc;

pub use json_rpc::JsonRpcLedger;
