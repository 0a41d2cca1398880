//! Artifact factory capability.

use std::future::Future;

use alloy_core::primitives::{Address, TxHash};
use anyhow::Result;

use crate::{abi::ArgValue, descriptor::SourceRef};

/// A deployment that has been submitted to the chain.
///
/// The address is known as soon as the creation is submitted; it only becomes
/// trustworthy once the transaction is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDeployment {
    pub address: Address,
    pub tx_hash: TxHash,
}

/// Turns a named contract into a new on-chain instance.
pub trait ArtifactFactory: Send + Sync {
    /// Deploy a new instance of `source` with the given constructor arguments.
    ///
    /// `component` is the logical name and is only used for logging and errors.
    fn deploy(
        &self,
        component: &str,
        source: &SourceRef,
        args: &[ArgValue],
    ) -> impl Future<Output = Result<PendingDeployment>> + Send;
}
