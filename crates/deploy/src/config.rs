//! Deployment configuration, stored as `Strat.toml`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    orchestrator::{ConfirmationPolicy, OrchestratorConfig},
    services::{EtherscanConfig, etherscan::DEFAULT_API_URL},
    stack::{DEFAULT_ASSET, StrategyStack},
    waiter::WaitConfig,
};

/// The default name of the configuration file.
pub const STRAT_CONFIG_FILENAME: &str = "Strat.toml";

/// Top level configuration of the `strat` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Root of the compiled Hardhat artifacts.
    pub artifacts_dir: PathBuf,
    /// Where deployment records are written.
    pub outdata: PathBuf,
    /// Command run before deploying, e.g. `["npx", "hardhat", "compile"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile: Option<Vec<String>>,
    pub stack: StackConfig,
    pub verification: VerificationConfig,
    pub networks: BTreeMap<String, NetworkConfig>,
}

/// Only `localhost` is predefined. Live networks need an endpoint that signs
/// for the sending account (public RPCs reject `eth_sendTransaction`), so
/// they are declared in `Strat.toml`, e.g.:
///
/// ```toml
/// [networks.polygon]
/// rpc_url = "http://127.0.0.1:8550" # signing proxy in front of a Polygon node
/// chain_id = 137
/// ```
impl Default for DeployConfig {
    fn default() -> Self {
        let networks = NetworkConfig::localhost()
            .map(|network| ("localhost".to_string(), network))
            .into_iter()
            .collect();

        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            outdata: PathBuf::from("deployments"),
            compile: None,
            stack: StackConfig::default(),
            verification: VerificationConfig::default(),
            networks,
        }
    }
}

impl DeployConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Strat.toml` in a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file or directory not found: {}", path.display());
        }

        let config_path = if path.is_dir() {
            path.join(STRAT_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).with_context(|| {
            format!(
                "Unknown network '{}' (configured: {})",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// Directory holding the deployment records of a network.
    pub fn record_dir(&self, network: &str) -> PathBuf {
        self.outdata.join(network)
    }
}

/// Parameters of the strategy stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub asset: Address,
    /// Controller owner; the sending account when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    /// Vault governance; the owner when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governance: Option<Address>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            asset: DEFAULT_ASSET,
            owner: None,
            governance: None,
        }
    }
}

impl StackConfig {
    /// Build the stack, filling unset roles with `sender`.
    pub fn build(&self, sender: Address) -> StrategyStack {
        let owner = self.owner.unwrap_or(sender);
        StrategyStack::new(self.asset, owner).governance(self.governance.unwrap_or(owner))
    }
}

/// A network the stack can be deployed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: Url,
    /// Expected chain id; checked against the node before deploying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Sending account; the node's first account when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Explorer API used for verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_api_url: Option<Url>,
    #[serde(default)]
    pub confirmations: ConfirmationPolicy,
}

fn default_poll_interval_ms() -> u64 {
    WaitConfig::default().poll_interval.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
    WaitConfig::default().timeout.as_secs()
}

impl NetworkConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            chain_id: None,
            from: None,
            confirmations: ConfirmationPolicy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            explorer_api_url: None,
        }
    }

    /// A local dev node mining on demand: nothing ever gets deeper on its own.
    fn localhost() -> Option<Self> {
        let mut network = Self::new(Url::parse("http://127.0.0.1:8545").ok()?);
        network.chain_id = Some(31337);
        network.confirmations.settlement = 0;
        network.poll_interval_ms = 200;
        Some(network)
    }

    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn orchestrator_config(&self, name: &str) -> OrchestratorConfig {
        OrchestratorConfig {
            network: name.to_string(),
            confirmations: self.confirmations,
            wait: self.wait_config(),
        }
    }
}

/// Source verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Treat verification failures as fatal.
    pub strict: bool,
    pub poll_interval_secs: u64,
    pub max_polls: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            strict: false,
            poll_interval_secs: 5,
            max_polls: 24,
        }
    }
}

impl VerificationConfig {
    pub fn etherscan_config(&self, network: &NetworkConfig, chain_id: u64) -> Result<EtherscanConfig> {
        let api_key = self
            .api_key
            .clone()
            .context("Verification requested but no explorer API key is configured (ETHERSCAN_KEY)")?;

        let api_url = match &network.explorer_api_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_API_URL).context("Invalid default explorer URL")?,
        };

        Ok(EtherscanConfig {
            api_url,
            api_key,
            chain_id,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
        })
    }
}
