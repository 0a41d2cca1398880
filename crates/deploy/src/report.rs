//! Results of an orchestration run.

use std::collections::HashMap;

use alloy_core::primitives::{Address, TxHash};
use comfy_table::{Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

use crate::{
    abi::ArgValue,
    descriptor::SourceRef,
    traits::{VerificationOutcome, VerificationRequest},
};

/// How far a deployment transaction has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConfirmationState {
    /// Sent, not yet gated on the settlement depth.
    Submitted,
    /// Reached the settlement depth.
    Settled { confirmations: u64, block_number: u64 },
}

impl std::fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationState::Submitted => f.write_str("submitted"),
            ConfirmationState::Settled {
                confirmations,
                block_number,
            } => write!(f, "settled ({} conf., block {})", confirmations, block_number),
        }
    }
}

/// A component instance created during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedInstance {
    pub name: String,
    pub source: SourceRef,
    pub address: Address,
    pub tx_hash: TxHash,
    /// Constructor arguments exactly as sent.
    pub constructor_args: Vec<ArgValue>,
    pub confirmation: ConfirmationState,
    /// `None` when verification was not requested or not reached.
    pub verification: Option<VerificationOutcome>,
}

impl DeployedInstance {
    /// The verification request for this instance.
    pub fn verification_request(&self) -> VerificationRequest {
        VerificationRequest {
            component: self.name.clone(),
            address: self.address,
            source: self.source.clone(),
            constructor_args: self.constructor_args.clone(),
        }
    }
}

/// A confirmed wiring call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringRecord {
    /// Label of the call, e.g. `Controller.setVault`.
    pub call: String,
    pub signature: String,
    pub args: Vec<ArgValue>,
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Everything a run did, in the order it did it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub network: String,
    pub instances: Vec<DeployedInstance>,
    pub wiring: Vec<WiringRecord>,
    /// Human description of the last step that completed.
    pub last_step: Option<String>,
}

impl DeploymentReport {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ..Default::default()
        }
    }

    pub fn instance(&self, name: &str) -> Option<&DeployedInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub(crate) fn instance_mut(&mut self, name: &str) -> Option<&mut DeployedInstance> {
        self.instances.iter_mut().find(|i| i.name == name)
    }

    /// Name to address mapping of every instance deployed so far.
    pub fn addresses(&self) -> HashMap<String, Address> {
        self.instances
            .iter()
            .map(|i| (i.name.clone(), i.address))
            .collect()
    }

    /// Instances whose verification failed, with the reason.
    pub fn verification_warnings(&self) -> Vec<(&str, &str)> {
        self.instances
            .iter()
            .filter_map(|i| match &i.verification {
                Some(VerificationOutcome::Failed(reason)) => Some((i.name.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Whether every instance reached the settlement depth.
    pub fn is_settled(&self) -> bool {
        !self.instances.is_empty()
            && self
                .instances
                .iter()
                .all(|i| matches!(i.confirmation, ConfirmationState::Settled { .. }))
    }

    pub(crate) fn record_step(&mut self, step: impl Into<String>) {
        self.last_step = Some(step.into());
    }

    /// Render the per-component summary as a table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Component", "Address", "Tx", "Confirmation", "Verification"]);

        for instance in &self.instances {
            table.add_row(vec![
                instance.name.clone(),
                instance.address.to_string(),
                instance.tx_hash.to_string(),
                instance.confirmation.to_string(),
                instance
                    .verification
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(name: &str, verification: Option<VerificationOutcome>) -> DeployedInstance {
        DeployedInstance {
            name: name.to_string(),
            source: SourceRef::new(format!("contracts/{name}.sol"), name),
            address: Address::repeat_byte(name.len() as u8),
            tx_hash: TxHash::repeat_byte(1),
            constructor_args: vec![],
            confirmation: ConfirmationState::Settled {
                confirmations: 5,
                block_number: 10,
            },
            verification,
        }
    }

    #[test]
    fn test_verification_warnings() {
        let mut report = DeploymentReport::new("polygon");
        report.instances = vec![
            instance("Controller", Some(VerificationOutcome::Verified)),
            instance("Vault", Some(VerificationOutcome::AlreadyVerified)),
            instance(
                "Strategy",
                Some(VerificationOutcome::Failed("rate limited".to_string())),
            ),
        ];

        assert_eq!(report.verification_warnings(), vec![("Strategy", "rate limited")]);
        assert!(report.is_settled());
    }

    #[test]
    fn test_table_lists_every_instance() {
        let mut report = DeploymentReport::new("localhost");
        report.instances = vec![instance("Controller", None), instance("Vault", None)];

        let rendered = report.to_table().to_string();
        assert!(rendered.contains("Controller"));
        assert!(rendered.contains("Vault"));
        assert!(rendered.contains("settled (5 conf., block 10)"));
    }
}
