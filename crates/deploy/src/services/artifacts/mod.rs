//! Artifact store and the factory deploying from it.

mod hardhat;

use std::path::{Path, PathBuf};

use anyhow::Context;

pub use hardhat::{AbiEntry, AbiParam, Artifact, BuildInfo};

use self::hardhat::DebugFile;
use crate::{
    abi::ArgValue,
    descriptor::SourceRef,
    traits::{ArtifactFactory, ChainClient, PendingDeployment, TxRequest},
};

/// Compiled artifacts laid out the way Hardhat writes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<source path>/<symbol>.json`
    pub fn artifact_path(&self, source: &SourceRef) -> PathBuf {
        self.root
            .join(&source.path)
            .join(format!("{}.json", source.symbol))
    }

    fn debug_path(&self, source: &SourceRef) -> PathBuf {
        self.root
            .join(&source.path)
            .join(format!("{}.dbg.json", source.symbol))
    }

    pub fn load_artifact(&self, source: &SourceRef) -> Result<Artifact, anyhow::Error> {
        let path = self.artifact_path(source);
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read artifact for {} at {} - did you compile?",
                source,
                path.display()
            )
        })?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }

    /// Load the build info referenced by the artifact's debug file.
    pub fn load_build_info(&self, source: &SourceRef) -> Result<BuildInfo, anyhow::Error> {
        let debug_path = self.debug_path(source);
        let content = std::fs::read_to_string(&debug_path)
            .with_context(|| format!("Failed to read {}", debug_path.display()))?;
        let debug: DebugFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", debug_path.display()))?;

        let build_info_path = debug_path
            .parent()
            .unwrap_or(&self.root)
            .join(&debug.build_info);
        let content = std::fs::read_to_string(&build_info_path)
            .with_context(|| format!("Failed to read build info {}", build_info_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse build info {}", build_info_path.display()))
    }
}

/// Deploys artifacts from an [`ArtifactStore`] through a [`ChainClient`].
///
/// The instance address is derived from the sender and nonce of the creation
/// transaction, so it is known before the transaction is mined.
pub struct ChainArtifactFactory<'a, C> {
    store: &'a ArtifactStore,
    chain: &'a C,
}

impl<'a, C: ChainClient> ChainArtifactFactory<'a, C> {
    pub fn new(store: &'a ArtifactStore, chain: &'a C) -> Self {
        Self { store, chain }
    }
}

impl<C: ChainClient> ArtifactFactory for ChainArtifactFactory<'_, C> {
    async fn deploy(
        &self,
        component: &str,
        source: &SourceRef,
        args: &[ArgValue],
    ) -> Result<PendingDeployment, anyhow::Error> {
        let artifact = self.store.load_artifact(source)?;
        let init_code = artifact
            .init_code(args)
            .with_context(|| format!("Invalid constructor arguments for {}", component))?;

        tracing::debug!(
            component,
            %source,
            init_code_len = init_code.len(),
            "Sending contract creation"
        );

        let submitted = self
            .chain
            .send_transaction(TxRequest::create(init_code))
            .await
            .with_context(|| format!("Failed to send creation of {}", component))?;

        Ok(PendingDeployment {
            address: submitted.created_address(),
            tx_hash: submitted.hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    fn write(path: &Path, content: &serde_json::Value) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string_pretty(content).unwrap()).unwrap();
    }

    #[test]
    fn test_load_artifact_and_build_info() {
        let dir = TempDir::new("strat-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());
        let source = SourceRef::new("contracts/Controller.sol", "Controller");

        write(
            &dir.path().join("contracts/Controller.sol/Controller.json"),
            &serde_json::json!({
                "contractName": "Controller",
                "sourceName": "contracts/Controller.sol",
                "abi": [{ "type": "constructor", "inputs": [{ "name": "_rewards", "type": "address" }] }],
                "bytecode": "0x6080"
            }),
        );
        write(
            &dir.path().join("contracts/Controller.sol/Controller.dbg.json"),
            &serde_json::json!({
                "_format": "hh-sol-dbg-1",
                "buildInfo": "../../build-info/abc123.json"
            }),
        );
        write(
            &dir.path().join("build-info/abc123.json"),
            &serde_json::json!({
                "solcLongVersion": "0.6.12+commit.27d51765",
                "input": { "language": "Solidity" }
            }),
        );

        let artifact = store.load_artifact(&source).unwrap();
        assert_eq!(artifact.contract_name, "Controller");
        assert_eq!(artifact.constructor_inputs().len(), 1);

        let info = store.load_build_info(&source).unwrap();
        assert_eq!(info.solc_long_version, "0.6.12+commit.27d51765");
    }

    #[test]
    fn test_missing_artifact_names_the_source() {
        let dir = TempDir::new("strat-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store
            .load_artifact(&SourceRef::new("contracts/Vault.sol", "Vault"))
            .unwrap_err();
        assert!(err.to_string().contains("contracts/Vault.sol:Vault"));
    }
}
