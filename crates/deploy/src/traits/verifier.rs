//! Source verification capability.

use std::future::Future;

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{abi::ArgValue, descriptor::SourceRef};

/// A request to register a deployed instance's source with a verification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Logical component name.
    pub component: String,
    pub address: Address,
    pub source: SourceRef,
    /// Constructor arguments exactly as used at deploy time.
    pub constructor_args: Vec<ArgValue>,
}

/// Terminal result of a verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum VerificationOutcome {
    Verified,
    /// Registered by an earlier submission; counts as success.
    AlreadyVerified,
    Failed(String),
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            VerificationOutcome::Verified | VerificationOutcome::AlreadyVerified
        )
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationOutcome::Verified => f.write_str("verified"),
            VerificationOutcome::AlreadyVerified => f.write_str("already verified"),
            VerificationOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Submits verification requests.
///
/// Implementations never fail: transport and service errors are reported as
/// [`VerificationOutcome::Failed`], since a failed verification never undoes a
/// deployment.
pub trait VerificationClient: Send + Sync {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = VerificationOutcome> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_verified_is_success() {
        assert!(VerificationOutcome::Verified.is_success());
        assert!(VerificationOutcome::AlreadyVerified.is_success());
        assert!(!VerificationOutcome::Failed("rate limited".to_string()).is_success());
    }
}
