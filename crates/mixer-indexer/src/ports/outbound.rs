//! # Outbound Ports
//!
//! The ledger source boundary: block-height queries, contract-code probes,
//! historical log queries and push subscriptions, plus the mock used across
//! the test suites.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{LeafInsertedEvent, LedgerError};

/// Push notification from a ledger source.
#[derive(Clone, Debug)]
pub enum LedgerNotification {
    /// A new `LeafInserted` emission. Optimistic: pushed events need not be
    /// buried to the confirmation depth.
    Event(LeafInsertedEvent),
    /// The provider reported an error; the subscription may have missed
    /// events.
    ProviderError(String),
    /// The provider switched networks; the prior subscription state is
    /// presumed stale.
    NetworkChanged {
        /// Chain id reported after the change.
        chain_id: u64,
    },
}

/// Live event subscription.
///
/// Unsubscribes on drop: any provider-side pump task is aborted and the
/// channel closes.
pub struct LedgerSubscription {
    rx: mpsc::UnboundedReceiver<LedgerNotification>,
    pump: Option<JoinHandle<()>>,
}

impl LedgerSubscription {
    /// Wrap a notification channel, optionally owning the task that feeds it.
    pub fn new(
        rx: mpsc::UnboundedReceiver<LedgerNotification>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self { rx, pump }
    }

    /// Next notification; `None` once the provider side has gone away.
    pub async fn recv(&mut self) -> Option<LedgerNotification> {
        self.rx.recv().await
    }
}

impl Drop for LedgerSubscription {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Blockchain log source - outbound port.
///
/// A source is scoped to one contract's `LeafInserted` log stream; the
/// address parameter on [`code_at`](LedgerSource::code_at) exists because
/// code probes are a property of the chain, not of the event filter.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Current chain head height.
    async fn current_height(&self) -> Result<u64, LedgerError>;

    /// Contract bytecode at `address`, at `height` or the latest block.
    /// Empty bytes mean no contract exists there.
    async fn code_at(&self, address: &str, height: Option<u64>)
        -> Result<Vec<u8>, LedgerError>;

    /// `LeafInserted` events in `[from_block, to_block]`, ascending by
    /// `(block_number, log_index)`.
    async fn query_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LeafInsertedEvent>, LedgerError>;

    /// Open a push subscription for new events and lifecycle notifications.
    async fn subscribe(&self) -> Result<LedgerSubscription, LedgerError>;
}

// =============================================================================
// Mock Implementation for Testing
// =============================================================================

/// In-memory ledger for tests: a scripted chain height, deployment block,
/// event log, and direct control over push delivery.
#[derive(Clone, Default)]
pub struct MockLedger {
    inner: Arc<MockLedgerState>,
}

#[derive(Default)]
struct MockLedgerState {
    height: Mutex<u64>,
    /// Block the contract was deployed in; `None` means no contract at all.
    deployed_at: Mutex<Option<u64>>,
    events: Mutex<Vec<LeafInsertedEvent>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<LedgerNotification>>>,
    fail_requests: Mutex<bool>,
}

impl MockLedger {
    /// Create an empty mock with no contract deployed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current chain head.
    pub fn set_height(&self, height: u64) {
        *self.inner.height.lock() = height;
    }

    /// Deploy the contract at `block`.
    pub fn set_deployed_at(&self, block: u64) {
        *self.inner.deployed_at.lock() = Some(block);
    }

    /// Make every request fail until cleared.
    pub fn set_fail_requests(&self, fail: bool) {
        *self.inner.fail_requests.lock() = fail;
    }

    /// Record an event in the log store without pushing it to subscribers
    /// (a "dropped push" only reconciliation can recover).
    pub fn add_event(&self, event: LeafInsertedEvent) {
        self.inner.events.lock().push(event);
    }

    /// Record an event and push it to every live subscriber.
    pub fn push_event(&self, event: LeafInsertedEvent) {
        self.add_event(event.clone());
        self.notify(LedgerNotification::Event(event));
    }

    /// Push a raw notification to every live subscriber.
    pub fn notify(&self, notification: LedgerNotification) {
        self.inner
            .subscribers
            .lock()
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if *self.inner.fail_requests.lock() {
            return Err(LedgerError::Rpc("mock provider failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerSource for MockLedger {
    async fn current_height(&self) -> Result<u64, LedgerError> {
        self.check_available()?;
        Ok(*self.inner.height.lock())
    }

    async fn code_at(
        &self,
        _address: &str,
        height: Option<u64>,
    ) -> Result<Vec<u8>, LedgerError> {
        self.check_available()?;
        let at = height.unwrap_or(*self.inner.height.lock());
        let deployed = match *self.inner.deployed_at.lock() {
            Some(block) => at >= block,
            None => false,
        };
        Ok(if deployed { vec![0x60, 0x80] } else { Vec::new() })
    }

    async fn query_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LeafInsertedEvent>, LedgerError> {
        self.check_available()?;
        let mut events: Vec<LeafInsertedEvent> = self
            .inner
            .events
            .lock()
            .iter()
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn subscribe(&self) -> Result<LedgerSubscription, LedgerError> {
        self.check_available()
            .map_err(|e| LedgerError::Subscription(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        Ok(LedgerSubscription::new(rx, None))
    }
}
