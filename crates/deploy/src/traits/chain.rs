//! Chain client capability.

use std::future::Future;

use alloy_core::primitives::{Address, Bytes, TxHash};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A transaction to submit from the client's sending account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Recipient, or `None` for a contract creation.
    pub to: Option<Address>,
    /// Calldata, or init code for a creation.
    pub data: Bytes,
    /// Optional gas limit; the node estimates it when absent.
    pub gas: Option<u64>,
}

impl TxRequest {
    /// A contract creation with the given init code.
    pub fn create(init_code: Bytes) -> Self {
        Self {
            to: None,
            data: init_code,
            gas: None,
        }
    }

    /// A call to an existing contract.
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            to: Some(to),
            data,
            gas: None,
        }
    }
}

/// A transaction accepted by the node but not necessarily mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    pub hash: TxHash,
    pub from: Address,
    pub nonce: u64,
}

impl SubmittedTx {
    /// Address of the contract created by this transaction, if it is a creation.
    pub fn created_address(&self) -> Address {
        self.from.create(self.nonce)
    }
}

/// Lifecycle status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TxStatus {
    /// Known to the node, not mined yet.
    Pending,
    /// Mined with a success status.
    Succeeded,
    /// Mined, but execution reverted.
    Reverted,
    /// Unknown to the node: replaced or evicted from the mempool.
    Dropped,
}

/// The parts of a transaction receipt the orchestrator cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
}

/// Submits transactions and reports on their settlement.
pub trait ChainClient: Send + Sync {
    /// The account transactions are sent from.
    fn sender(&self) -> Address;

    /// Submit a transaction. Nonces are assigned by the client, in submission order.
    fn send_transaction(&self, tx: TxRequest) -> impl Future<Output = Result<SubmittedTx>> + Send;

    /// Current status of a transaction.
    fn status_of(&self, handle: TxHash) -> impl Future<Output = Result<TxStatus>> + Send;

    /// Number of blocks including and built on top of the transaction's block.
    ///
    /// Zero while the transaction is not mined.
    fn confirmations_of(&self, handle: TxHash) -> impl Future<Output = Result<u64>> + Send;

    /// The receipt, once mined.
    fn receipt(&self, handle: TxHash) -> impl Future<Output = Result<Option<TxReceipt>>> + Send;
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;

    use super::*;

    #[test]
    fn test_created_address_follows_sender_nonce() {
        let tx = SubmittedTx {
            hash: TxHash::ZERO,
            from: address!("b20a608c624Ca5003905aA834De7156C68b2E1d0"),
            nonce: 0,
        };
        assert_eq!(
            tx.created_address(),
            address!("00000000219ab540356cBB839Cbe05303d7705Fa")
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TxStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(TxStatus::Dropped.to_string(), "dropped");
    }
}
