//! Error taxonomy of an orchestration run.

use std::time::Duration;

use alloy_core::primitives::TxHash;

use crate::{
    graph::GraphError,
    pipeline::{Stage, TransitionError},
    report::DeploymentReport,
    waiter::WaitError,
};

/// A fatal error. Every variant aborts the remaining pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The plan was rejected before anything was sent.
    #[error("invalid deployment plan: {0}")]
    InvalidPlan(#[from] GraphError),

    /// The factory could not produce an instance, or its deployment reverted.
    #[error("failed to deploy {component}: {cause:#}")]
    DeployFailure {
        component: String,
        cause: anyhow::Error,
    },

    /// A wiring call was rejected or reverted.
    #[error("wiring call {call} failed: {cause:#}")]
    WiringFailure { call: String, cause: anyhow::Error },

    /// A transaction did not reach its required depth in time.
    #[error("{context}: transaction {handle} did not reach {depth} confirmation(s) within {waited:?}")]
    ConfirmationTimeout {
        context: String,
        handle: TxHash,
        depth: u64,
        waited: Duration,
    },

    #[error(transparent)]
    Pipeline(#[from] TransitionError),
}

impl DeployError {
    /// Classify a failed wait on a wiring call.
    pub(crate) fn wiring_wait(call: String, err: WaitError) -> Self {
        match err {
            WaitError::Timeout {
                handle,
                depth,
                waited,
            } => DeployError::ConfirmationTimeout {
                context: call,
                handle,
                depth,
                waited,
            },
            other => DeployError::WiringFailure {
                call,
                cause: other.into(),
            },
        }
    }

    /// Classify a failed wait on a deployment transaction.
    pub(crate) fn deploy_wait(component: String, err: WaitError) -> Self {
        match err {
            WaitError::Timeout {
                handle,
                depth,
                waited,
            } => DeployError::ConfirmationTimeout {
                context: component,
                handle,
                depth,
                waited,
            },
            other => DeployError::DeployFailure {
                component,
                cause: other.into(),
            },
        }
    }
}

/// A run that stopped on a fatal error.
///
/// Nothing already sent is rolled back: `partial` holds every instance and
/// wiring call that made it on chain, for manual remediation.
#[derive(Debug, thiserror::Error)]
#[error("deployment failed while {stage}: {error}")]
pub struct RunFailure {
    /// The stage the error happened in.
    pub stage: Stage,
    #[source]
    pub error: DeployError,
    pub partial: Box<DeploymentReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        let handle = TxHash::repeat_byte(4);
        let timeout = WaitError::Timeout {
            handle,
            depth: 1,
            waited: Duration::from_secs(3),
        };

        let err = DeployError::wiring_wait("Controller.setVault".to_string(), timeout);
        assert!(matches!(
            err,
            DeployError::ConfirmationTimeout { ref context, .. } if context == "Controller.setVault"
        ));

        let err = DeployError::wiring_wait("Controller.setVault".to_string(), WaitError::Reverted(handle));
        assert!(matches!(err, DeployError::WiringFailure { .. }));

        let err = DeployError::deploy_wait("Vault".to_string(), WaitError::Dropped(handle));
        assert!(matches!(err, DeployError::DeployFailure { ref component, .. } if component == "Vault"));
        assert!(err.to_string().contains("dropped"));
    }
}
