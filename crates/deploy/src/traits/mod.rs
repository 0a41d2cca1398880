//! Capability traits for the external collaborators of a deployment.
//!
//! The orchestrator only talks to the chain, the artifact factory and the
//! verification service through these traits, so a run can be driven by
//! in-memory fakes as well as by the JSON-RPC and explorer clients in
//! [`crate::services`].

mod chain;
mod factory;
mod verifier;

pub use chain::{ChainClient, SubmittedTx, TxReceipt, TxRequest, TxStatus};
pub use factory::{ArtifactFactory, PendingDeployment};
pub use verifier::{VerificationClient, VerificationOutcome, VerificationRequest};
