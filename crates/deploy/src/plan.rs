//! Deployment plans and their content hash.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{descriptor::ComponentDescriptor, wiring::WiringCall};

/// Everything a single orchestration run executes: the components to deploy
/// and the wiring calls to issue once they all exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Components, in declaration order.
    pub components: Vec<ComponentDescriptor>,
    /// Wiring calls, executed strictly in this order.
    pub wiring: Vec<WiringCall>,
}

impl DeploymentPlan {
    pub fn new(components: Vec<ComponentDescriptor>) -> Self {
        Self {
            components,
            wiring: Vec::new(),
        }
    }

    /// Append a wiring call.
    pub fn wire(mut self, call: WiringCall) -> Self {
        self.wiring.push(call);
        self
    }

    /// Append several wiring calls, preserving their order.
    pub fn wire_all(mut self, calls: impl IntoIterator<Item = WiringCall>) -> Self {
        self.wiring.extend(calls);
        self
    }

    pub fn component(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.iter().find(|c| c.name == name)
    }

    /// SHA-256 of the plan's JSON form, hex encoded.
    ///
    /// Two runs with the same hash deployed the same components with the same
    /// literal arguments and wiring.
    pub fn compute_hash(&self) -> Result<String> {
        let json = serde_json::to_string(self).context("Failed to serialize deployment plan")?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());

        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::Address;

    use super::*;
    use crate::stack::StrategyStack;

    #[test]
    fn test_hash_determinism() {
        let plan = StrategyStack::new(Address::repeat_byte(1), Address::repeat_byte(2)).plan();

        let hash1 = plan.compute_hash().unwrap();
        let hash2 = plan.clone().compute_hash().unwrap();

        assert_eq!(hash1, hash2, "Hash should be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_hash_changes_with_asset() {
        let plan1 = StrategyStack::new(Address::repeat_byte(1), Address::repeat_byte(2)).plan();
        let plan2 = StrategyStack::new(Address::repeat_byte(3), Address::repeat_byte(2)).plan();

        assert_ne!(
            plan1.compute_hash().unwrap(),
            plan2.compute_hash().unwrap(),
            "Hash should change when the asset changes"
        );
    }
}
