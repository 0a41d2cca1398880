//! Etherscan-compatible verification API responses.

use serde::Deserialize;

use crate::traits::VerificationOutcome;

/// Envelope of every explorer API response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct ApiResponse {
    pub status: String,
    pub message: String,
    pub result: String,
}

impl ApiResponse {
    fn ok(&self) -> bool {
        self.status == "1"
    }

    fn mentions(&self, needle: &str) -> bool {
        self.result.to_lowercase().contains(needle) || self.message.to_lowercase().contains(needle)
    }

    fn is_already_verified(&self) -> bool {
        self.mentions("already verified")
    }

    fn is_rate_limited(&self) -> bool {
        self.mentions("rate limit")
    }
}

/// Errors while talking to the explorer.
#[derive(Debug, thiserror::Error)]
pub(super) enum ExplorerError {
    /// The explorer is not ready yet; worth asking again.
    #[error("{0}")]
    NotReady(String),
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl ExplorerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExplorerError::NotReady(_))
    }
}

/// Result of a `verifysourcecode` submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Submission {
    /// Queued; poll with this GUID.
    Queued(String),
    AlreadyVerified,
}

pub(super) fn classify_submission(response: &ApiResponse) -> Result<Submission, ExplorerError> {
    if response.ok() {
        return Ok(Submission::Queued(response.result.clone()));
    }
    if response.is_already_verified() {
        return Ok(Submission::AlreadyVerified);
    }
    // The explorer has not indexed the creation yet.
    if response.mentions("unable to locate contractcode") || response.is_rate_limited() {
        return Err(ExplorerError::NotReady(response.result.clone()));
    }

    Err(ExplorerError::Rejected(response.result.clone()))
}

/// Result of a `checkverifystatus` poll. `NotReady` while still queued.
pub(super) fn classify_status(response: &ApiResponse) -> Result<VerificationOutcome, ExplorerError> {
    if response.mentions("pending in queue") || response.is_rate_limited() {
        return Err(ExplorerError::NotReady(response.result.clone()));
    }
    if response.is_already_verified() {
        return Ok(VerificationOutcome::AlreadyVerified);
    }
    if response.ok() || response.mentions("pass - verified") {
        return Ok(VerificationOutcome::Verified);
    }

    Ok(VerificationOutcome::Failed(response.result.clone()))
}
