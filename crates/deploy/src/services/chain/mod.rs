//! Chain client over Ethereum JSON-RPC.
//!
//! Transactions are sent with `eth_sendTransaction`, so the sending account
//! must be unlocked on the node (a dev node, or a signing proxy in front of
//! the real endpoint).

mod rpc;

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use alloy_core::primitives::{Address, TxHash};
use anyhow::Context;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use self::rpc::RpcReceipt;
use crate::{
    rpc::{create_client, json_rpc_call, parse_hex_u64, to_hex_quantity},
    traits::{ChainClient, SubmittedTx, TxReceipt, TxRequest, TxStatus},
};

/// How long a sent transaction may be unknown to the node before it is
/// reported as dropped.
pub const DEFAULT_DROP_GRACE: Duration = Duration::from_secs(60);

/// [`ChainClient`] backed by a JSON-RPC endpoint.
pub struct RpcChainClient {
    client: reqwest::Client,
    url: Url,
    from: Address,
    /// Next nonce to use. Held across a send so concurrent sends get
    /// consecutive nonces in submission order.
    nonce: Mutex<Option<u64>>,
    missing: Mutex<MissingTransactions>,
}

/// Tracks transactions the node does not know about.
///
/// Load-balanced endpoints routinely answer `null` for a transaction that
/// another backend just accepted, so a transaction only counts as dropped
/// once it has been missing for the whole grace period.
#[derive(Debug)]
struct MissingTransactions {
    grace: Duration,
    since: HashMap<TxHash, Instant>,
}

impl MissingTransactions {
    fn new(grace: Duration) -> Self {
        Self {
            grace,
            since: HashMap::new(),
        }
    }

    /// Classify an unmined transaction from one lookup taken at `now`.
    fn observe(&mut self, handle: TxHash, known: bool, now: Instant) -> TxStatus {
        if known {
            self.since.remove(&handle);
            return TxStatus::Pending;
        }

        let since = *self.since.entry(handle).or_insert(now);
        if now.duration_since(since) >= self.grace {
            self.since.remove(&handle);
            TxStatus::Dropped
        } else {
            tracing::debug!(
                %handle,
                missing_for = ?now.duration_since(since),
                "Transaction unknown to the node"
            );
            TxStatus::Pending
        }
    }
}

impl RpcChainClient {
    /// Connect to `url`, sending from `from` or the node's first account.
    pub async fn connect(url: Url, from: Option<Address>) -> Result<Self, anyhow::Error> {
        let client = create_client()?;

        let from = match from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    json_rpc_call(&client, url.as_str(), "eth_accounts", vec![])
                        .await
                        .context("Failed to list node accounts")?;
                accounts.first().copied().context(
                    "The node exposes no unlocked account; set `from` in the network configuration",
                )?
            }
        };

        tracing::info!(%url, %from, "Connected to chain");

        Ok(Self {
            client,
            url,
            from,
            nonce: Mutex::new(None),
            missing: Mutex::new(MissingTransactions::new(DEFAULT_DROP_GRACE)),
        })
    }

    /// Set how long a transaction may stay unknown before it counts as dropped.
    pub fn with_drop_grace(mut self, grace: Duration) -> Self {
        self.missing = Mutex::new(MissingTransactions::new(grace));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        let result: String = self.call("eth_chainId", vec![]).await?;
        parse_hex_u64(&result)
    }

    pub async fn block_number(&self) -> Result<u64, anyhow::Error> {
        let result: String = self.call("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&result)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    async fn pending_nonce(&self) -> Result<u64, anyhow::Error> {
        let result: String = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(self.from), serde_json::json!("pending")],
            )
            .await
            .context("Failed to fetch account nonce")?;
        parse_hex_u64(&result)
    }

    async fn fetch_receipt(&self, handle: TxHash) -> Result<Option<RpcReceipt>, anyhow::Error> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(handle)])
            .await
    }
}

impl ChainClient for RpcChainClient {
    fn sender(&self) -> Address {
        self.from
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<SubmittedTx, anyhow::Error> {
        let mut next = self.nonce.lock().await;
        let nonce = match *next {
            Some(nonce) => nonce,
            None => self.pending_nonce().await?,
        };

        let mut params = serde_json::json!({
            "from": self.from,
            "data": tx.data,
            "nonce": to_hex_quantity(nonce),
        });
        if let Some(to) = tx.to {
            params["to"] = serde_json::json!(to);
        }
        if let Some(gas) = tx.gas {
            params["gas"] = serde_json::json!(to_hex_quantity(gas));
        }

        match self.call::<TxHash>("eth_sendTransaction", vec![params]).await {
            Ok(hash) => {
                *next = Some(nonce + 1);
                tracing::debug!(%hash, nonce, to = ?tx.to, "Transaction sent");
                Ok(SubmittedTx {
                    hash,
                    from: self.from,
                    nonce,
                })
            }
            Err(e) => {
                // The node may have consumed the nonce anyway; refetch next time.
                *next = None;
                Err(e.context("Failed to send transaction"))
            }
        }
    }

    async fn status_of(&self, handle: TxHash) -> Result<TxStatus, anyhow::Error> {
        if let Some(receipt) = self.fetch_receipt(handle).await? {
            self.missing.lock().await.since.remove(&handle);
            return Ok(if receipt.succeeded() {
                TxStatus::Succeeded
            } else {
                TxStatus::Reverted
            });
        }

        let tx: Option<Value> = self
            .call("eth_getTransactionByHash", vec![serde_json::json!(handle)])
            .await?;

        Ok(self
            .missing
            .lock()
            .await
            .observe(handle, tx.is_some(), Instant::now()))
    }

    async fn confirmations_of(&self, handle: TxHash) -> Result<u64, anyhow::Error> {
        let Some(receipt) = self.fetch_receipt(handle).await? else {
            return Ok(0);
        };
        let head = self.block_number().await?;
        Ok(head.saturating_sub(receipt.block_number) + 1)
    }

    async fn receipt(&self, handle: TxHash) -> Result<Option<TxReceipt>, anyhow::Error> {
        Ok(self.fetch_receipt(handle).await?.map(TxReceipt::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_transaction_is_dropped_after_grace() {
        let mut missing = MissingTransactions::new(Duration::from_secs(30));
        let handle = TxHash::repeat_byte(1);
        let start = Instant::now();

        // A single null right after sending is not a drop.
        assert_eq!(missing.observe(handle, false, start), TxStatus::Pending);
        assert_eq!(
            missing.observe(handle, false, start + Duration::from_secs(29)),
            TxStatus::Pending
        );
        assert_eq!(
            missing.observe(handle, false, start + Duration::from_secs(30)),
            TxStatus::Dropped
        );
    }

    #[test]
    fn test_reappearing_transaction_resets_grace() {
        let mut missing = MissingTransactions::new(Duration::from_secs(30));
        let handle = TxHash::repeat_byte(2);
        let other = TxHash::repeat_byte(3);
        let start = Instant::now();

        assert_eq!(missing.observe(handle, false, start), TxStatus::Pending);
        assert_eq!(
            missing.observe(handle, true, start + Duration::from_secs(20)),
            TxStatus::Pending
        );
        assert_eq!(
            missing.observe(handle, false, start + Duration::from_secs(40)),
            TxStatus::Pending
        );

        // Grace is tracked per transaction.
        assert_eq!(
            missing.observe(other, false, start + Duration::from_secs(40)),
            TxStatus::Pending
        );
        assert_eq!(
            missing.observe(handle, false, start + Duration::from_secs(70)),
            TxStatus::Dropped
        );
    }
}
