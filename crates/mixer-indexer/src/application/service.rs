//! # Event Indexer Service
//!
//! Orchestrates backfill, live ingestion and periodic reconciliation,
//! applying each distinct on-chain emission to the accumulator exactly once,
//! in emission order.
//!
//! The service is the accumulator's sole writer. All mutation happens on one
//! task inside [`run`](EventIndexerService::run)'s `select!` loop, so the
//! subscription path and the reconciliation timer can never interleave
//! inserts; readers go through [`TreeReader`](super::TreeReader) snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use mixer_tree::encoding::fr_to_hex;
use mixer_tree::{CommitmentTree, TreeHasher};

use crate::config::IndexerConfig;
use crate::domain::{
    advance_cursor, confirmed_ceiling, dedup_retention_floor, in_emission_order, EventId,
    IndexerError, IndexerPhase, IndexerStatus, LeafInsertedEvent, LedgerError,
};
use crate::ports::outbound::{LedgerNotification, LedgerSource, LedgerSubscription};

use super::read_api::TreeReader;

/// Event indexer service - mirrors the contract's commitment log into the
/// accumulator.
pub struct EventIndexerService<L: LedgerSource, H: TreeHasher> {
    config: IndexerConfig,
    ledger: Arc<L>,
    tree: Arc<RwLock<CommitmentTree<H>>>,
    /// Applied event ids, each with the block it was emitted in (for
    /// retention pruning).
    processed: HashMap<EventId, u64>,
    /// Highest block whose events are guaranteed applied. Never decreases.
    last_processed_block: u64,
    phase: IndexerPhase,
}

impl<L: LedgerSource, H: TreeHasher> EventIndexerService<L, H> {
    /// Create a new indexer over a ledger source and a shared tree handle.
    pub fn new(
        config: IndexerConfig,
        ledger: Arc<L>,
        tree: Arc<RwLock<CommitmentTree<H>>>,
    ) -> Self {
        Self {
            config,
            ledger,
            tree,
            processed: HashMap::new(),
            last_processed_block: 0,
            phase: IndexerPhase::Backfilling,
        }
    }

    /// Read-only handle over the accumulator, safe to share with the HTTP
    /// layer.
    pub fn reader(&self) -> TreeReader<H> {
        TreeReader::new(Arc::clone(&self.tree))
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> IndexerStatus {
        let tree = self.tree.read();
        IndexerStatus {
            phase: self.phase,
            last_processed_block: self.last_processed_block,
            leaf_count: tree.leaf_count(),
            root: fr_to_hex(&tree.root()),
        }
    }

    /// Verify the contract, locate the start block and backfill history.
    ///
    /// Any error here is fatal: the process has nothing useful to do with a
    /// misconfigured contract or an unreachable provider at boot.
    pub async fn start(&mut self) -> Result<(), IndexerError> {
        info!("initializing event indexer");
        match self.start_inner().await {
            Ok(()) => {
                self.phase = IndexerPhase::Live;
                info!(
                    last_processed_block = self.last_processed_block,
                    leaf_count = self.tree.read().leaf_count(),
                    "event indexer is live"
                );
                Ok(())
            }
            Err(e) => {
                self.phase = IndexerPhase::Failed;
                error!(error = %e, "event indexer failed to start");
                Err(e)
            }
        }
    }

    async fn start_inner(&mut self) -> Result<(), IndexerError> {
        let code = self
            .ledger
            .code_at(&self.config.contract_address, None)
            .await?;
        if code.is_empty() {
            return Err(IndexerError::ContractNotFound {
                address: self.config.contract_address.clone(),
            });
        }

        let start_block = match self.config.start_block {
            Some(block) => block,
            None => {
                info!("locating contract deployment block");
                let block = self.find_deployment_block().await?;
                info!(block, "contract deployment block located");
                block
            }
        };

        self.backfill(start_block).await
    }

    /// Run the live loop until `shutdown` fires.
    ///
    /// Single consumer of all state mutation: pushed events, reconciliation
    /// passes and subscription recovery all execute on this task.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut subscription = self.resubscribe().await;

        let mut ticker = tokio::time::interval(self.config.sync_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; spend it here so
        // the loop's ticks are all full periods.
        ticker.tick().await;

        loop {
            tokio::select! {
                note = recv_or_pending(&mut subscription) => match note {
                    Some(LedgerNotification::Event(event)) => self.apply_push(event),
                    Some(LedgerNotification::ProviderError(message)) => {
                        warn!(%message, "provider error; reconciliation will repair any gap");
                    }
                    Some(LedgerNotification::NetworkChanged { chain_id }) => {
                        info!(chain_id, "network changed; re-establishing subscription");
                        subscription = self.resubscribe().await;
                    }
                    None => {
                        warn!("event subscription closed; will retry on next sync tick");
                        subscription = None;
                    }
                },
                _ = ticker.tick() => {
                    if subscription.is_none() {
                        subscription = self.resubscribe().await;
                    }
                    match self.reconcile().await {
                        Ok(applied) if applied > 0 => {
                            info!(applied, "reconciliation applied missed events");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "reconciliation pass failed"),
                    }
                },
                _ = shutdown.changed() => {
                    info!("shutdown signal received; stopping event indexer");
                    break;
                }
            }
        }
    }

    /// Locate the deployment block by binary search over the monotonic
    /// predicate "contract code present at this height".
    async fn find_deployment_block(&self) -> Result<u64, IndexerError> {
        let head = self.ledger.current_height().await?;
        let mut lo = 0u64;
        let mut hi = head;
        let mut found = head;

        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let code = self
                .ledger
                .code_at(&self.config.contract_address, Some(mid))
                .await?;
            if code.is_empty() {
                lo = mid + 1;
            } else {
                found = mid;
                match mid.checked_sub(1) {
                    Some(upper) => hi = upper,
                    None => break,
                }
            }
        }

        Ok(found)
    }

    /// Replay historical events over `[start_block, head - confirmations]`.
    async fn backfill(&mut self, start_block: u64) -> Result<(), IndexerError> {
        self.phase = IndexerPhase::Backfilling;

        let head = self.ledger.current_height().await?;
        let ceiling = confirmed_ceiling(head, self.config.confirmations);

        if start_block > ceiling {
            info!("no historical events to index");
            self.last_processed_block = ceiling;
            return Ok(());
        }

        info!(from = start_block, to = ceiling, "indexing historical events");
        let events = self.query_range_chunked(start_block, ceiling).await?;
        info!(count = events.len(), "found historical leaf insertions");

        for event in &events {
            self.apply_confirmed(event);
        }
        self.last_processed_block = ceiling;

        info!("historical event indexing complete");
        Ok(())
    }

    /// Re-query the confirmed range past the cursor and apply anything the
    /// push path missed. The sole guarantee of eventual convergence.
    async fn reconcile(&mut self) -> Result<usize, IndexerError> {
        let head = self.ledger.current_height().await?;
        let ceiling = confirmed_ceiling(head, self.config.confirmations);
        let from = self.last_processed_block + 1;

        if from > ceiling {
            return Ok(0);
        }

        debug!(from, to = ceiling, "reconciling against confirmed log range");
        let events = self.query_range_chunked(from, ceiling).await?;

        let mut applied = 0;
        for event in &events {
            if self.apply_confirmed(event) {
                applied += 1;
            }
        }

        self.last_processed_block = advance_cursor(self.last_processed_block, ceiling);
        self.prune_dedup();
        Ok(applied)
    }

    /// Ranged log query split into provider-friendly chunks, results merged
    /// and sorted into emission order.
    async fn query_range_chunked(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LeafInsertedEvent>, LedgerError> {
        let chunk = self.config.backfill_chunk_size.max(1);
        let mut events = Vec::new();
        let mut from = from_block;

        while from <= to_block {
            let to = to_block.min(from.saturating_add(chunk - 1));
            let mut batch = self.ledger.query_events(from, to).await?;
            events.append(&mut batch);
            match to.checked_add(1) {
                Some(next) => from = next,
                None => break,
            }
        }

        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    /// Apply an optimistically pushed event.
    ///
    /// Pushes may arrive out of emission order; one that is not the next
    /// leaf is dropped without touching the cursor, leaving the gap inside
    /// the next reconciliation window where it gets applied in order.
    fn apply_push(&mut self, event: LeafInsertedEvent) {
        let id = event.id();
        if self.processed.contains_key(&id) {
            debug!(
                block = event.block_number,
                log_index = event.log_index,
                "event already processed, skipping"
            );
            return;
        }

        let leaf_count = self.tree.read().leaf_count();
        if !in_emission_order(event.leaf_index, leaf_count) {
            warn!(
                leaf_index = event.leaf_index,
                expected = leaf_count,
                "out-of-order push dropped; reconciliation will apply it in order"
            );
            return;
        }

        match self.tree.write().add_leaf(event.leaf) {
            Ok(index) => {
                info!(
                    index,
                    block = event.block_number,
                    "applied pushed leaf insertion"
                );
            }
            Err(e) => {
                error!(error = %e, "failed to apply pushed leaf");
                return;
            }
        }

        self.processed.insert(id, event.block_number);
        self.last_processed_block =
            advance_cursor(self.last_processed_block, event.block_number);
    }

    /// Apply an event from a confirmed range query. Returns whether the
    /// event was new.
    fn apply_confirmed(&mut self, event: &LeafInsertedEvent) -> bool {
        let id = event.id();
        if self.processed.contains_key(&id) {
            debug!(
                block = event.block_number,
                log_index = event.log_index,
                "event already processed, skipping"
            );
            return false;
        }

        match self.tree.write().add_leaf(event.leaf) {
            Ok(index) => {
                if event.leaf_index != index {
                    warn!(
                        claimed = event.leaf_index,
                        local = index,
                        "on-chain leaf index disagrees with local insertion index"
                    );
                }
                debug!(index, block = event.block_number, "applied leaf insertion");
            }
            Err(e) => {
                error!(error = %e, "failed to apply confirmed leaf");
                return false;
            }
        }

        self.processed.insert(id, event.block_number);
        true
    }

    /// Drop dedup keys for history buried past the confirmation depth;
    /// idempotency only matters near the unconfirmed frontier.
    fn prune_dedup(&mut self) {
        let floor = dedup_retention_floor(self.last_processed_block, self.config.confirmations);
        let before = self.processed.len();
        self.processed.retain(|_, block| *block >= floor);
        let pruned = before - self.processed.len();
        if pruned > 0 {
            debug!(pruned, retained = self.processed.len(), "pruned settled dedup keys");
        }
    }

    async fn resubscribe(&self) -> Option<LedgerSubscription> {
        match self.ledger.subscribe().await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(error = %e, "subscription unavailable; relying on reconciliation");
                None
            }
        }
    }
}

/// Await the next notification, or park forever while no subscription is
/// open (the sync tick re-establishes one).
async fn recv_or_pending(
    subscription: &mut Option<LedgerSubscription>,
) -> Option<LedgerNotification> {
    match subscription {
        Some(active) => active.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::inbound::MixerReadApi;
    use crate::ports::outbound::MockLedger;
    use mixer_tree::{Fr, PoseidonTreeHasher};

    fn new_service(
        ledger: &MockLedger,
    ) -> EventIndexerService<MockLedger, PoseidonTreeHasher> {
        let config = IndexerConfig::for_testing();
        let tree = Arc::new(RwLock::new(CommitmentTree::new(
            config.tree_depth,
            PoseidonTreeHasher::new(),
        )));
        EventIndexerService::new(config, Arc::new(ledger.clone()), tree)
    }

    fn event(leaf_index: u64, block: u64, tx: u8, log_index: u64) -> LeafInsertedEvent {
        LeafInsertedEvent {
            leaf_index,
            leaf: Fr::from(100 + leaf_index),
            block_number: block,
            transaction_hash: [tx; 32],
            log_index,
        }
    }

    #[tokio::test]
    async fn test_start_fails_without_contract() {
        let ledger = MockLedger::new();
        ledger.set_height(100);
        let mut service = new_service(&ledger);

        let err = service.start().await.unwrap_err();
        assert!(matches!(err, IndexerError::ContractNotFound { .. }));
        assert_eq!(service.status().phase, IndexerPhase::Failed);
    }

    #[tokio::test]
    async fn test_start_fails_on_unreachable_provider() {
        let ledger = MockLedger::new();
        ledger.set_fail_requests(true);
        let mut service = new_service(&ledger);

        let err = service.start().await.unwrap_err();
        assert!(matches!(err, IndexerError::Ledger(_)));
        assert_eq!(service.status().phase, IndexerPhase::Failed);
    }

    #[tokio::test]
    async fn test_find_deployment_block() {
        let ledger = MockLedger::new();
        ledger.set_height(1000);
        ledger.set_deployed_at(357);
        let service = new_service(&ledger);

        assert_eq!(service.find_deployment_block().await.unwrap(), 357);
    }

    #[tokio::test]
    async fn test_find_deployment_block_at_genesis() {
        let ledger = MockLedger::new();
        ledger.set_height(50);
        ledger.set_deployed_at(0);
        let service = new_service(&ledger);

        assert_eq!(service.find_deployment_block().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_backfill_applies_confirmed_history() {
        let ledger = MockLedger::new();
        ledger.set_height(20);
        ledger.set_deployed_at(3);
        ledger.add_event(event(0, 4, 0xa0, 0));
        ledger.add_event(event(1, 5, 0xa1, 0));
        // Above the confirmation ceiling (20 - 2 = 18): must not backfill.
        ledger.add_event(event(2, 19, 0xa2, 0));

        let mut service = new_service(&ledger);
        service.start().await.unwrap();

        let status = service.status();
        assert_eq!(status.phase, IndexerPhase::Live);
        assert_eq!(status.leaf_count, 2);
        assert_eq!(status.last_processed_block, 18);
    }

    #[tokio::test]
    async fn test_backfill_empty_range_still_sets_cursor() {
        let ledger = MockLedger::new();
        ledger.set_height(30);
        ledger.set_deployed_at(29);

        let mut service = new_service(&ledger);
        service.start().await.unwrap();

        // Deployment (29) is above the ceiling (28): nothing to scan, but
        // the cursor still lands on the ceiling.
        assert_eq!(service.status().last_processed_block, 28);
        assert_eq!(service.status().leaf_count, 0);
    }

    #[tokio::test]
    async fn test_backfill_applies_in_emission_order() {
        let ledger = MockLedger::new();
        ledger.set_height(20);
        ledger.set_deployed_at(0);
        // Inserted into the mock out of order; the query sorts them.
        ledger.add_event(event(1, 5, 0xa1, 1));
        ledger.add_event(event(0, 5, 0xa0, 0));
        ledger.add_event(event(2, 6, 0xa2, 0));

        let mut service = new_service(&ledger);
        service.start().await.unwrap();

        let leaves = service.reader().all_leaves();
        let expected: Vec<String> =
            (0..3u64).map(|i| fr_to_hex(&Fr::from(100 + i))).collect();
        assert_eq!(leaves, expected);
    }

    #[tokio::test]
    async fn test_chunked_backfill_equals_single_query() {
        let ledger = MockLedger::new();
        ledger.set_height(100);
        ledger.set_deployed_at(0);
        for i in 0..10u64 {
            ledger.add_event(event(i, i * 9, i as u8, 0));
        }

        let mut config = IndexerConfig::for_testing();
        config.backfill_chunk_size = 7;
        let tree = Arc::new(RwLock::new(CommitmentTree::new(
            config.tree_depth,
            PoseidonTreeHasher::new(),
        )));
        let service = EventIndexerService::new(config, Arc::new(ledger.clone()), tree);

        let chunked = service.query_range_chunked(0, 98).await.unwrap();
        let single = ledger.query_events(0, 98).await.unwrap();
        assert_eq!(chunked, single);
        assert_eq!(chunked.len(), 10);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_applies_once() {
        let ledger = MockLedger::new();
        let mut service = new_service(&ledger);

        let ev = event(0, 10, 0xaa, 0);
        assert!(service.apply_confirmed(&ev));
        assert!(!service.apply_confirmed(&ev));
        assert_eq!(service.status().leaf_count, 1);
    }

    #[tokio::test]
    async fn test_push_dedup_and_cursor_advance() {
        let ledger = MockLedger::new();
        let mut service = new_service(&ledger);

        let ev = event(0, 10, 0xaa, 0);
        service.apply_push(ev.clone());
        service.apply_push(ev);

        let status = service.status();
        assert_eq!(status.leaf_count, 1);
        assert_eq!(status.last_processed_block, 10);
    }

    #[tokio::test]
    async fn test_out_of_order_push_dropped_without_cursor_advance() {
        let ledger = MockLedger::new();
        let mut service = new_service(&ledger);

        // Claims index 1 while the tree holds 0 leaves.
        service.apply_push(event(1, 12, 0xbb, 0));

        let status = service.status();
        assert_eq!(status.leaf_count, 0);
        assert_eq!(status.last_processed_block, 0);
    }

    #[tokio::test]
    async fn test_reconcile_applies_missed_events() {
        let ledger = MockLedger::new();
        ledger.set_height(10);
        ledger.set_deployed_at(0);
        let mut service = new_service(&ledger);
        service.start().await.unwrap();
        assert_eq!(service.status().leaf_count, 0);

        // Event lands without a push; head advances past confirmation depth.
        ledger.add_event(event(0, 9, 0xcc, 0));
        ledger.set_height(12);

        let applied = service.reconcile().await.unwrap();
        assert_eq!(applied, 1);
        assert_eq!(service.status().leaf_count, 1);
        assert_eq!(service.status().last_processed_block, 10);
    }

    #[tokio::test]
    async fn test_reconcile_respects_confirmation_depth() {
        let ledger = MockLedger::new();
        ledger.set_height(10);
        ledger.set_deployed_at(0);
        let mut service = new_service(&ledger);
        service.start().await.unwrap();

        // At the head, zero confirmations: reconciliation must not touch it.
        ledger.add_event(event(0, 10, 0xdd, 0));
        assert_eq!(service.reconcile().await.unwrap(), 0);
        assert_eq!(service.status().leaf_count, 0);

        // Buried deep enough now.
        ledger.set_height(12);
        assert_eq!(service.reconcile().await.unwrap(), 1);
        assert_eq!(service.status().leaf_count, 1);
    }

    #[tokio::test]
    async fn test_reconcile_advances_cursor_over_empty_range() {
        let ledger = MockLedger::new();
        ledger.set_height(10);
        ledger.set_deployed_at(0);
        let mut service = new_service(&ledger);
        service.start().await.unwrap();

        ledger.set_height(50);
        assert_eq!(service.reconcile().await.unwrap(), 0);
        assert_eq!(service.status().last_processed_block, 48);
    }

    #[tokio::test]
    async fn test_reconcile_error_is_reported_not_fatal() {
        let ledger = MockLedger::new();
        ledger.set_height(10);
        ledger.set_deployed_at(0);
        let mut service = new_service(&ledger);
        service.start().await.unwrap();

        ledger.set_fail_requests(true);
        assert!(service.reconcile().await.is_err());

        ledger.set_fail_requests(false);
        ledger.add_event(event(0, 9, 0xee, 0));
        ledger.set_height(12);
        assert_eq!(service.reconcile().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dedup_pruning_keeps_unconfirmed_frontier() {
        let ledger = MockLedger::new();
        ledger.set_height(10);
        ledger.set_deployed_at(0);
        // Block 5 is backfilled; block 9 sits above the ceiling until the
        // head advances.
        ledger.add_event(event(0, 5, 0x01, 0));
        ledger.add_event(event(1, 9, 0x02, 0));

        let mut service = new_service(&ledger);
        service.start().await.unwrap();
        assert_eq!(service.status().leaf_count, 1);

        ledger.set_height(12);
        service.reconcile().await.unwrap();
        assert_eq!(service.status().leaf_count, 2);

        // Cursor is 10, confirmations 2: the block-5 key is settled history
        // and gets pruned, the block-9 key stays in the frontier window.
        assert!(!service.processed.contains_key(&event(0, 5, 0x01, 0).id()));
        assert!(service.processed.contains_key(&event(1, 9, 0x02, 0).id()));
    }

    #[tokio::test]
    async fn test_status_reports_root() {
        let ledger = MockLedger::new();
        let mut service = new_service(&ledger);
        let empty_root = service.status().root;

        service.apply_confirmed(&event(0, 1, 0x11, 0));
        assert_ne!(service.status().root, empty_root);
    }
}
