//! Confirmation-depth gating for submitted transactions.

use std::time::{Duration, Instant};

use alloy_core::primitives::TxHash;

use crate::traits::{ChainClient, TxReceipt, TxStatus};

/// Default interval between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default upper bound on a single confirmation wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Polling configuration of a [`TransactionWaiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Why a transaction did not reach the required depth.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
    #[error("transaction {0} was dropped before being mined")]
    Dropped(TxHash),
    #[error("transaction {handle} did not reach {depth} confirmation(s) within {waited:?}")]
    Timeout {
        handle: TxHash,
        depth: u64,
        waited: Duration,
    },
}

/// A transaction that reached its required depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub confirmations: u64,
    pub receipt: TxReceipt,
}

/// Blocks the calling flow until a transaction is deep enough.
pub struct TransactionWaiter<'a, C> {
    chain: &'a C,
    config: WaitConfig,
}

impl<'a, C: ChainClient> TransactionWaiter<'a, C> {
    pub fn new(chain: &'a C, config: WaitConfig) -> Self {
        Self { chain, config }
    }

    /// Wait until `handle` is mined successfully and `depth` blocks deep.
    ///
    /// A depth of zero still requires the transaction to be mined with a
    /// success status. Query errors are retried until the timeout.
    pub async fn wait(&self, handle: TxHash, depth: u64) -> Result<Confirmation, WaitError> {
        let start = Instant::now();
        let required = depth.max(1);

        tracing::debug!(%handle, depth, "Waiting for transaction confirmations");

        loop {
            match self.chain.status_of(handle).await {
                Ok(TxStatus::Reverted) => return Err(WaitError::Reverted(handle)),
                Ok(TxStatus::Dropped) => return Err(WaitError::Dropped(handle)),
                Ok(TxStatus::Pending) => {
                    tracing::trace!(%handle, "Transaction still pending");
                }
                Ok(TxStatus::Succeeded) => {
                    if let Some(confirmation) = self.check_depth(handle, required).await {
                        tracing::debug!(
                            %handle,
                            confirmations = confirmation.confirmations,
                            block = confirmation.receipt.block_number,
                            "Transaction confirmed"
                        );
                        return Ok(confirmation);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, %handle, "Status query failed, retrying...");
                }
            }

            let waited = start.elapsed();
            if waited >= self.config.timeout {
                return Err(WaitError::Timeout {
                    handle,
                    depth,
                    waited,
                });
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn check_depth(&self, handle: TxHash, required: u64) -> Option<Confirmation> {
        let confirmations = match self.chain.confirmations_of(handle).await {
            Ok(confirmations) => confirmations,
            Err(e) => {
                tracing::debug!(error = %e, %handle, "Confirmation query failed, retrying...");
                return None;
            }
        };

        if confirmations < required {
            tracing::trace!(%handle, confirmations, required, "Not deep enough yet");
            return None;
        }

        match self.chain.receipt(handle).await {
            Ok(Some(receipt)) => Some(Confirmation {
                confirmations,
                receipt,
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, %handle, "Receipt query failed, retrying...");
                None
            }
        }
    }
}
