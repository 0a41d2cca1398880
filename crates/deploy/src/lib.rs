//! strat-deploy - Deployment orchestration for the Controller / Vault / Strategy stack.
//!
//! This crate deploys the components of a strategy stack in dependency order,
//! wires them together, gates every step on confirmation depth and submits
//! the sources for verification.

pub mod abi;
mod compile;
mod config;
mod descriptor;
mod error;
mod graph;
mod orchestrator;
pub mod pipeline;
mod plan;
mod record;
mod report;
pub mod rpc;
pub mod services;
mod stack;
pub mod traits;
mod waiter;
mod wiring;

pub use abi::ArgValue;
pub use compile::run_compile;
pub use config::{
    DeployConfig, NetworkConfig, STRAT_CONFIG_FILENAME, StackConfig, VerificationConfig,
};
pub use descriptor::{ArgSlot, ComponentDescriptor, SourceRef};
pub use error::{DeployError, RunFailure};
pub use graph::{DependencyGraph, GraphError};
pub use orchestrator::{
    ConfirmationPolicy, DEFAULT_SETTLEMENT_CONFIRMATIONS, DEFAULT_WIRING_CONFIRMATIONS,
    Orchestrator, OrchestratorConfig,
};
pub use pipeline::{PipelineEvent, PipelineState, Stage};
pub use plan::DeploymentPlan;
pub use record::{DeploymentRecord, RecordedInstance, TOOL_VERSION};
pub use report::{ConfirmationState, DeployedInstance, DeploymentReport, WiringRecord};
pub use services::{ArtifactStore, ChainArtifactFactory, EtherscanVerifier, RpcChainClient};
pub use stack::{CONTROLLER, DEFAULT_ASSET, STRATEGY, StrategyStack, VAULT};
pub use waiter::{Confirmation, TransactionWaiter, WaitConfig, WaitError};
pub use wiring::{ResolvedCall, WiringCall, controller_wiring};
