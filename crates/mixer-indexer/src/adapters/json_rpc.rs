//! # JSON-RPC Ledger Adapter
//!
//! Implements [`LedgerSource`] over an Ethereum JSON-RPC endpoint:
//! `eth_blockNumber`, `eth_getCode` and `eth_getLogs` with the
//! `LeafInserted` topic filter.
//!
//! Push delivery is emulated: `eth_subscribe` needs a WebSocket transport,
//! so [`subscribe`](LedgerSource::subscribe) spawns a short-interval poll
//! task over the same log filter and feeds its findings into the
//! subscription channel. The task also watches `eth_chainId` and reports a
//! network change when it moves.

use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use primitive_types::U256;
use serde::Deserialize;
use serde_json::json;
use sha3::{Digest, Keccak256};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use mixer_tree::encoding::fr_from_be_bytes;

use crate::domain::{LeafInsertedEvent, LedgerError};
use crate::ports::outbound::{LedgerNotification, LedgerSource, LedgerSubscription};

/// Solidity signature of the commitment-insertion event.
const LEAF_INSERTED_SIGNATURE: &str = "LeafInserted(uint256,uint256,uint256)";

/// Ethereum JSON-RPC implementation of [`LedgerSource`].
pub struct JsonRpcLedger {
    client: HttpClient,
    contract_address: String,
    topic0: String,
    poll_interval: Duration,
}

impl JsonRpcLedger {
    /// Connect to `rpc_url`, scoped to `contract_address`'s events.
    pub fn new(
        rpc_url: &str,
        contract_address: String,
        poll_interval: Duration,
    ) -> Result<Self, LedgerError> {
        let client = HttpClientBuilder::default()
            .build(rpc_url)
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(Self {
            client,
            contract_address,
            topic0: event_topic(LEAF_INSERTED_SIGNATURE),
            poll_interval,
        })
    }

    async fn chain_id(client: &HttpClient) -> Result<u64, LedgerError> {
        let raw: String = client
            .request("eth_chainId", rpc_params![])
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        parse_hex_u64(&raw)
    }

    async fn fetch_logs(
        client: &HttpClient,
        contract_address: &str,
        topic0: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LeafInsertedEvent>, LedgerError> {
        let filter = json!({
            "address": contract_address,
            "fromBlock": format!("0x{from_block:x}"),
            "toBlock": format!("0x{to_block:x}"),
            "topics": [topic0],
        });
        let logs: Vec<RpcLog> = client
            .request("eth_getLogs", rpc_params![filter])
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs.iter().filter(|l| !l.removed) {
            events.push(decode_log(log)?);
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }
}

#[async_trait]
impl LedgerSource for JsonRpcLedger {
    async fn current_height(&self) -> Result<u64, LedgerError> {
        let raw: String = self
            .client
            .request("eth_blockNumber", rpc_params![])
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        parse_hex_u64(&raw)
    }

    async fn code_at(
        &self,
        address: &str,
        height: Option<u64>,
    ) -> Result<Vec<u8>, LedgerError> {
        let tag = match height {
            Some(h) => format!("0x{h:x}"),
            None => "latest".to_string(),
        };
        let raw: String = self
            .client
            .request("eth_getCode", rpc_params![address, tag])
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        parse_hex_bytes(&raw)
    }

    async fn query_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LeafInsertedEvent>, LedgerError> {
        Self::fetch_logs(
            &self.client,
            &self.contract_address,
            &self.topic0,
            from_block,
            to_block,
        )
        .await
    }

    async fn subscribe(&self) -> Result<LedgerSubscription, LedgerError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let client = self.client.clone();
        let contract_address = self.contract_address.clone();
        let topic0 = self.topic0.clone();
        let poll_interval = self.poll_interval;

        // Seed the poll position and chain id; failing here makes the
        // subscription attempt itself fail, which the service treats as
        // transient.
        let start_height: String = client
            .request("eth_blockNumber", rpc_params![])
            .await
            .map_err(|e| LedgerError::Subscription(e.to_string()))?;
        let mut last_seen = parse_hex_u64(&start_height)?;
        let mut known_chain_id = Self::chain_id(&client).await?;

        let pump = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;

                match Self::chain_id(&client).await {
                    Ok(chain_id) if chain_id != known_chain_id => {
                        known_chain_id = chain_id;
                        if tx
                            .send(LedgerNotification::NetworkChanged { chain_id })
                            .is_err()
                        {
                            break;
                        }
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if tx
                            .send(LedgerNotification::ProviderError(e.to_string()))
                            .is_err()
                        {
                            break;
                        }
                        continue;
                    }
                }

                let head = match client
                    .request::<String, _>("eth_blockNumber", rpc_params![])
                    .await
                    .map_err(|e| LedgerError::Rpc(e.to_string()))
                    .and_then(|raw| parse_hex_u64(&raw))
                {
                    Ok(head) => head,
                    Err(e) => {
                        if tx
                            .send(LedgerNotification::ProviderError(e.to_string()))
                            .is_err()
                        {
                            break;
                        }
                        continue;
                    }
                };

                if head <= last_seen {
                    continue;
                }

                match Self::fetch_logs(&client, &contract_address, &topic0, last_seen + 1, head)
                    .await
                {
                    Ok(events) => {
                        debug!(from = last_seen + 1, to = head, count = events.len(), "poll window");
                        for event in events {
                            if tx.send(LedgerNotification::Event(event)).is_err() {
                                return;
                            }
                        }
                        last_seen = head;
                    }
                    Err(e) => {
                        warn!(error = %e, "subscription poll failed");
                        if tx
                            .send(LedgerNotification::ProviderError(e.to_string()))
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
        });

        Ok(LedgerSubscription::new(rx, Some(pump)))
    }
}

/// One log entry as returned by `eth_getLogs`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    block_number: String,
    transaction_hash: String,
    log_index: String,
    data: String,
    #[serde(default)]
    removed: bool,
}

/// Keccak-256 topic hash of an event signature, `0x`-prefixed.
fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(signature.as_bytes())))
}

/// Decode a `LeafInserted` log: three non-indexed `uint256` words in `data`
/// (`leafIndex`, `leaf`, `newRoot`). The root word is dropped — the
/// accumulator recomputes every root locally.
fn decode_log(log: &RpcLog) -> Result<LeafInsertedEvent, LedgerError> {
    let data = parse_hex_bytes(&log.data)?;
    if data.len() != 96 {
        return Err(LedgerError::Decode(format!(
            "LeafInserted data should be 96 bytes, got {}",
            data.len()
        )));
    }

    let leaf_index_word = U256::from_big_endian(&data[0..32]);
    if leaf_index_word > U256::from(u64::MAX) {
        return Err(LedgerError::Decode(format!(
            "leaf index {leaf_index_word} exceeds u64"
        )));
    }

    let tx_bytes = parse_hex_bytes(&log.transaction_hash)?;
    let transaction_hash: [u8; 32] = tx_bytes
        .try_into()
        .map_err(|_| LedgerError::Decode("transaction hash is not 32 bytes".to_string()))?;

    Ok(LeafInsertedEvent {
        leaf_index: leaf_index_word.as_u64(),
        leaf: fr_from_be_bytes(&data[32..64]),
        block_number: parse_hex_u64(&log.block_number)?,
        transaction_hash,
        log_index: parse_hex_u64(&log.log_index)?,
    })
}

/// Parse a `0x`-prefixed hex quantity into a u64.
fn parse_hex_u64(raw: &str) -> Result<u64, LedgerError> {
    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(trimmed, 16)
        .map_err(|e| LedgerError::Decode(format!("bad hex quantity {raw:?}: {e}")))
}

/// Parse `0x`-prefixed hex data into bytes. `"0x"` decodes to empty.
fn parse_hex_bytes(raw: &str) -> Result<Vec<u8>, LedgerError> {
    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(trimmed).map_err(|e| LedgerError::Decode(format!("bad hex data {raw:?}: {e}")))
}
