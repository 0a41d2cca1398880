//! Persistent record of a deployment run.

use std::{
    collections::BTreeMap,
    fs::OpenOptions,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, TxHash};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    descriptor::SourceRef,
    pipeline::Stage,
    report::{ConfirmationState, DeploymentReport},
    traits::VerificationOutcome,
};

/// Version of the tool that wrote a record.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One deployed component, as recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedInstance {
    pub address: Address,
    pub tx_hash: TxHash,
    pub source: SourceRef,
    pub confirmation: ConfirmationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationOutcome>,
}

/// Written under `<outdata>/<network>/` after every run, successful or not.
///
/// Every run gets its own file: earlier records are never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: String,
    pub chain_id: u64,
    pub timestamp: DateTime<Utc>,
    pub tool_version: String,
    /// Hash of the deployment plan, see [`crate::DeploymentPlan::compute_hash`].
    pub plan_hash: String,
    pub instances: BTreeMap<String, RecordedInstance>,
    /// Wiring call label to transaction hash, in execution order.
    pub wiring: Vec<(String, TxHash)>,
    /// Whether the whole pipeline ran to completion.
    pub complete: bool,
    /// Stage a failed run stopped in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentRecord {
    /// Record a finished run.
    pub fn from_report(chain_id: u64, plan_hash: String, report: &DeploymentReport) -> Self {
        Self {
            network: report.network.clone(),
            chain_id,
            timestamp: Utc::now(),
            tool_version: TOOL_VERSION.to_string(),
            plan_hash,
            instances: report
                .instances
                .iter()
                .map(|instance| {
                    (
                        instance.name.clone(),
                        RecordedInstance {
                            address: instance.address,
                            tx_hash: instance.tx_hash,
                            source: instance.source.clone(),
                            confirmation: instance.confirmation,
                            verification: instance.verification.clone(),
                        },
                    )
                })
                .collect(),
            wiring: report
                .wiring
                .iter()
                .map(|record| (record.call.clone(), record.tx_hash))
                .collect(),
            complete: true,
            failed_stage: None,
            error: None,
        }
    }

    /// Mark the record as an aborted run.
    pub fn failed(mut self, stage: Stage, error: impl std::fmt::Display) -> Self {
        self.complete = false;
        self.failed_stage = Some(stage);
        self.error = Some(error.to_string());
        self
    }

    /// File stem of this record: UTC timestamp, then a plan hash prefix.
    pub fn file_stem(&self) -> String {
        let hash = self.plan_hash.get(..12).unwrap_or(&self.plan_hash);
        format!("{}-{}", self.timestamp.format("%Y%m%dT%H%M%S%3fZ"), hash)
    }

    /// Write the record as a new file in `dir` and return its path.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize deployment record")?;

        let stem = self.file_stem();
        let mut attempt = 0u32;
        loop {
            let path = match attempt {
                0 => dir.join(format!("{stem}.json")),
                n => dir.join(format!("{stem}-{n}.json")),
            };

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).with_context(|| {
                        format!("Failed to write deployment record to {}", path.display())
                    })?;
                    tracing::info!(path = %path.display(), complete = self.complete, "Deployment record saved");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create deployment record {}", path.display())
                    });
                }
            }
        }
    }

    /// Every record found in `dir`, oldest first. A missing directory has no history.
    pub fn history(dir: &Path) -> Result<Vec<Self>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list deployment records in {}", dir.display()))?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list deployment records in {}", dir.display()))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                records.push(Self::load(&path)?);
            }
        }

        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment record {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse deployment record {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::report::{DeployedInstance, WiringRecord};

    fn report() -> DeploymentReport {
        let mut report = DeploymentReport::new("polygon");
        report.instances.push(DeployedInstance {
            name: "Controller".to_string(),
            source: SourceRef::new("contracts/Controller.sol", "Controller"),
            address: Address::repeat_byte(0xc0),
            tx_hash: TxHash::repeat_byte(1),
            constructor_args: vec![],
            confirmation: ConfirmationState::Submitted,
            verification: None,
        });
        report.wiring.push(WiringRecord {
            call: "Controller.setVault".to_string(),
            signature: "setVault(address,address)".to_string(),
            args: vec![],
            tx_hash: TxHash::repeat_byte(2),
            block_number: 3,
        });
        report
    }

    #[test]
    fn test_failed_record_survives_disk() {
        let dir = TempDir::new("strat-record").unwrap();
        let records = dir.path().join("deployments/polygon");

        let record = DeploymentRecord::from_report(137, "ab".repeat(32), &report())
            .failed(Stage::Wiring, "wiring call Controller.approveStrategy failed");
        let path = record.save_in(&records).unwrap();
        assert!(path.starts_with(&records));

        let loaded = DeploymentRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
        assert!(!loaded.complete);
        assert_eq!(loaded.failed_stage, Some(Stage::Wiring));
        assert_eq!(
            loaded.instances["Controller"].address,
            Address::repeat_byte(0xc0)
        );
        assert_eq!(loaded.wiring[0].0, "Controller.setVault");
    }

    #[test]
    fn test_reruns_keep_earlier_records() {
        let dir = TempDir::new("strat-record").unwrap();
        let records = dir.path().join("polygon");

        let first = DeploymentRecord::from_report(137, "ab".repeat(32), &report());
        let first_path = first.save_in(&records).unwrap();

        let mut rerun = report();
        rerun.instances[0].address = Address::repeat_byte(0xc1);
        let second = DeploymentRecord::from_report(137, "ab".repeat(32), &rerun)
            .failed(Stage::Deploying, "failed to deploy Vault");
        let second_path = second.save_in(&records).unwrap();

        // Same record twice still lands in two files.
        let third_path = first.save_in(&records).unwrap();

        assert_ne!(first_path, second_path);
        assert_ne!(first_path, third_path);
        assert_eq!(DeploymentRecord::load(&first_path).unwrap(), first);

        let history = DeploymentRecord::history(&records).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.contains(&first));
        assert!(history.contains(&second));
        assert_eq!(history.iter().filter(|r| r.complete).count(), 2);
        assert!(
            history
                .iter()
                .any(|r| r.instances["Controller"].address == Address::repeat_byte(0xc0))
        );
    }

    #[test]
    fn test_missing_directory_has_no_history() {
        let dir = TempDir::new("strat-record").unwrap();
        assert!(DeploymentRecord::history(&dir.path().join("sepolia")).unwrap().is_empty());
    }
}
