//! # Application Layer
//!
//! The indexer service orchestrating backfill, live ingestion and
//! reconciliation, plus the read-API implementation over the shared tree.

pub mod read_api;
pub mod service;

pub use read_api::TreeReader;
pub use service::EventIndexerService;
