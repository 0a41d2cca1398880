//! Production implementations of the capability traits.
//!
//! Each service is in its own submodule with:
//! - `mod.rs` - the client and its configuration
//! - a wire module (`rpc.rs`, `hardhat.rs`, `api.rs`) with the raw payloads

pub mod artifacts;
pub mod chain;
pub mod etherscan;

pub use artifacts::{Artifact, ArtifactStore, BuildInfo, ChainArtifactFactory};
pub use chain::RpcChainClient;
pub use etherscan::{EtherscanConfig, EtherscanVerifier};
