//! Raw JSON-RPC payloads used by the chain client.

use alloy_core::primitives::{Address, TxHash};
use serde::Deserialize;

use crate::{
    rpc::{deserialize_opt_u64_from_hex, deserialize_u64_from_hex},
    traits::TxReceipt,
};

/// Subset of `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RpcReceipt {
    pub transaction_hash: TxHash,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub block_number: u64,
    /// Absent on pre-Byzantium receipts.
    #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
    pub status: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub gas_used: u64,
}

impl RpcReceipt {
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}

impl From<RpcReceipt> for TxReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        TxReceipt {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.succeeded(),
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used,
        }
    }
}
