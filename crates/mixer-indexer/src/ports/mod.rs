//! # Ports
//!
//! Inbound API traits and outbound dependency traits, hexagonal style.
//! Mock implementations for testing live beside the outbound traits.

pub mod inbound;
pub mod outbound;

pub use inbound::MixerReadApi;
pub use outbound::{
    LedgerNotification, LedgerSource, LedgerSubscription, MockLedger,
};
