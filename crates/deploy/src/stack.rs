//! The standard Controller / Vault / Strategy stack.

use alloy_core::primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::{
    descriptor::{ArgSlot, ComponentDescriptor, SourceRef},
    plan::DeploymentPlan,
    wiring::controller_wiring,
};

/// Logical name of the controller component.
pub const CONTROLLER: &str = "Controller";
/// Logical name of the vault component.
pub const VAULT: &str = "Vault";
/// Logical name of the strategy component.
pub const STRATEGY: &str = "Strategy";

/// USDC on Polygon PoS, the asset the stack is usually deployed for.
pub const DEFAULT_ASSET: Address = address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174");

/// Parameters of the standard strategy stack.
///
/// The resulting plan is:
/// 1. `Controller(owner)`
/// 2. `Vault(asset, Controller, governance)` and `Strategy(Controller)`
/// 3. `setVault`, `approveStrategy`, `setStrategy` on the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStack {
    /// The token the vault accepts and the strategy farms.
    pub asset: Address,
    /// Owner passed to the controller constructor.
    pub owner: Address,
    /// Governance passed to the vault constructor.
    pub governance: Address,
    pub controller_source: SourceRef,
    pub vault_source: SourceRef,
    pub strategy_source: SourceRef,
}

impl StrategyStack {
    /// Create a stack where `owner` also acts as vault governance.
    pub fn new(asset: Address, owner: Address) -> Self {
        Self {
            asset,
            owner,
            governance: owner,
            controller_source: SourceRef::new("contracts/Controller.sol", "Controller"),
            vault_source: SourceRef::new("contracts/Vault.sol", "Vault"),
            strategy_source: SourceRef::new("contracts/StrategyTemplate.sol", "StrategyTemplate"),
        }
    }

    /// Override the vault governance.
    pub fn governance(mut self, governance: Address) -> Self {
        self.governance = governance;
        self
    }

    /// Override the strategy contract.
    pub fn strategy_source(mut self, source: SourceRef) -> Self {
        self.strategy_source = source;
        self
    }

    /// Build the deployment plan for this stack.
    pub fn plan(&self) -> DeploymentPlan {
        let controller = ComponentDescriptor::new(CONTROLLER, self.controller_source.clone())
            .arg(ArgSlot::literal(self.owner));

        let vault = ComponentDescriptor::new(VAULT, self.vault_source.clone())
            .arg(ArgSlot::literal(self.asset))
            .arg(ArgSlot::reference(CONTROLLER))
            .arg(ArgSlot::literal(self.governance));

        let strategy = ComponentDescriptor::new(STRATEGY, self.strategy_source.clone())
            .arg(ArgSlot::reference(CONTROLLER));

        DeploymentPlan::new(vec![controller, vault, strategy])
            .wire_all(controller_wiring(CONTROLLER, VAULT, STRATEGY, self.asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_shape() {
        let owner = Address::repeat_byte(0xaa);
        let plan = StrategyStack::new(DEFAULT_ASSET, owner).plan();

        let names: Vec<&str> = plan.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![CONTROLLER, VAULT, STRATEGY]);
        assert_eq!(plan.wiring.len(), 3);

        let vault = plan.component(VAULT).unwrap();
        assert_eq!(
            vault.args,
            vec![
                ArgSlot::literal(DEFAULT_ASSET),
                ArgSlot::reference(CONTROLLER),
                ArgSlot::literal(owner),
            ]
        );
        assert_eq!(vault.source.to_string(), "contracts/Vault.sol:Vault");
    }

    #[test]
    fn test_governance_override() {
        let owner = Address::repeat_byte(0xaa);
        let gov = Address::repeat_byte(0xbb);
        let plan = StrategyStack::new(DEFAULT_ASSET, owner).governance(gov).plan();

        assert_eq!(plan.component(VAULT).unwrap().args[2], ArgSlot::literal(gov));
        assert_eq!(plan.component(CONTROLLER).unwrap().args, vec![ArgSlot::literal(owner)]);
    }
}
