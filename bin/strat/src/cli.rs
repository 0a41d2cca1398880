use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use strat_deploy::{DeployConfig, STRAT_CONFIG_FILENAME};
use tracing::level_filters::LevelFilter;
use url::Url;

/// The default network to deploy to.
const DEFAULT_NETWORK: &str = "localhost";

/// How the final summary is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "strat")]
#[command(
    author,
    version,
    about = "Deploy, wire and verify a Controller / Vault / Strategy stack"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STRAT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to deploy to, as named in the configuration.
    #[arg(short, long, env = "STRAT_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Submit the deployed sources for verification once settled.
    #[arg(long, env = "STRAT_VERIFY")]
    pub verify: bool,

    /// Fail the run when any verification fails.
    #[arg(long, env = "STRAT_STRICT_VERIFICATION")]
    pub strict_verification: bool,

    /// Explorer API key used for verification.
    #[arg(long, env = "ETHERSCAN_KEY", hide_env_values = true)]
    pub etherscan_key: Option<String>,

    /// Override the RPC endpoint of the selected network.
    #[arg(long, alias = "rpc", env = "STRAT_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Skip the compile command, even if one is configured.
    #[arg(long, env = "STRAT_NO_COMPILE")]
    pub no_compile: bool,

    /// Format of the final summary.
    #[arg(long, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Path to a Strat.toml configuration file, or a directory containing one.
    ///
    /// Defaults to ./Strat.toml when present.
    #[arg(long, alias = "conf", env = "STRAT_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Layer defaults, the config file, `STRAT_*` environment variables and
    /// the command line flags, in increasing order of precedence.
    pub fn load_config(&self) -> anyhow::Result<DeployConfig> {
        let mut figment = Figment::from(Serialized::defaults(DeployConfig::default()));

        match &self.config {
            Some(path) if !path.exists() => {
                anyhow::bail!("Configuration file or directory not found: {}", path.display());
            }
            Some(path) if path.is_dir() => {
                figment = figment.merge(Toml::file(path.join(STRAT_CONFIG_FILENAME)));
            }
            Some(path) => {
                figment = figment.merge(Toml::file(path));
            }
            None => {
                figment = figment.merge(Toml::file(STRAT_CONFIG_FILENAME));
            }
        }

        let mut config: DeployConfig = figment
            .merge(Env::prefixed("STRAT_").split("__"))
            .extract()
            .context("Failed to load configuration")?;

        if let Some(key) = &self.etherscan_key {
            config.verification.api_key = Some(key.clone());
        }
        if self.strict_verification {
            config.verification.strict = true;
        }
        if let Some(url) = &self.rpc_url {
            let network = config
                .networks
                .get_mut(&self.network)
                .with_context(|| format!("Unknown network '{}'", self.network))?;
            network.rpc_url = url.clone();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_config_file_is_layered_over_defaults() {
        let dir = TempDir::new("strat-cli").unwrap();
        std::fs::write(
            dir.path().join(STRAT_CONFIG_FILENAME),
            r#"
            artifacts_dir = "build/artifacts"

            [networks.polygon]
            rpc_url = "https://polygon.example.org"
            chain_id = 137

            [networks.polygon.confirmations]
            settlement = 10
            "#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "strat",
            "--network",
            "polygon",
            "--config",
            dir.path().to_str().unwrap(),
            "--etherscan-key",
            "KEY",
            "--strict-verification",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.artifacts_dir, PathBuf::from("build/artifacts"));
        assert_eq!(config.outdata, PathBuf::from("deployments"));
        assert!(config.networks.contains_key("localhost"));

        let polygon = config.network("polygon").unwrap();
        assert_eq!(polygon.rpc_url.as_str(), "https://polygon.example.org/");
        assert_eq!(polygon.confirmations.settlement, 10);
        assert_eq!(polygon.confirmations.wiring, 1);

        assert_eq!(config.verification.api_key.as_deref(), Some("KEY"));
        assert!(config.verification.strict);
    }

    #[test]
    fn test_rpc_override_needs_known_network() {
        let dir = TempDir::new("strat-cli").unwrap();

        let cli = Cli::parse_from([
            "strat",
            "--network",
            "localhost",
            "--config",
            dir.path().to_str().unwrap(),
            "--rpc-url",
            "http://10.0.0.2:8545",
        ]);
        let config = cli.load_config().unwrap();
        assert_eq!(
            config.network("localhost").unwrap().rpc_url.as_str(),
            "http://10.0.0.2:8545/"
        );

        let cli = Cli::parse_from([
            "strat",
            "--network",
            "goerli",
            "--config",
            dir.path().to_str().unwrap(),
            "--rpc-url",
            "http://10.0.0.2:8545",
        ]);
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn test_missing_config_path_is_an_error() {
        let cli = Cli::parse_from(["strat", "--config", "/nonexistent/Strat.toml"]);
        assert!(cli.load_config().is_err());
    }
}
