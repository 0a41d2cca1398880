//! Component descriptors: what to deploy and with which constructor arguments.

use std::{collections::HashMap, fmt, str::FromStr};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{abi::ArgValue, graph::GraphError};

/// Reference to a contract's source, in `path:Symbol` form
/// (e.g. `contracts/Vault.sol:Vault`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceRef {
    /// Path of the source file, relative to the project root.
    pub path: String,
    /// Name of the contract inside the source file.
    pub symbol: String,
}

impl SourceRef {
    pub fn new(path: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.symbol)
    }
}

impl FromStr for SourceRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, symbol) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid source reference '{}': expected path:Symbol", s))?;

        if path.is_empty() || symbol.is_empty() {
            anyhow::bail!("Invalid source reference '{}': empty path or symbol", s);
        }

        Ok(Self::new(path, symbol))
    }
}

impl TryFrom<String> for SourceRef {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceRef> for String {
    fn from(value: SourceRef) -> Self {
        value.to_string()
    }
}

/// A constructor or call argument slot.
///
/// A slot is either a literal value or a back-reference to another
/// component, which resolves to that component's deployed address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSlot {
    Literal(ArgValue),
    Ref(String),
}

impl ArgSlot {
    pub fn literal(value: impl Into<ArgValue>) -> Self {
        ArgSlot::Literal(value.into())
    }

    pub fn reference(component: impl Into<String>) -> Self {
        ArgSlot::Ref(component.into())
    }

    /// The component this slot points at, if it is a back-reference.
    pub fn referenced(&self) -> Option<&str> {
        match self {
            ArgSlot::Ref(name) => Some(name),
            ArgSlot::Literal(_) => None,
        }
    }
}

/// Resolve a list of slots against the addresses known so far.
///
/// `owner` only names the caller in the error.
pub fn resolve_slots(
    owner: &str,
    slots: &[ArgSlot],
    addresses: &HashMap<String, Address>,
) -> Result<Vec<ArgValue>, GraphError> {
    slots
        .iter()
        .map(|slot| match slot {
            ArgSlot::Literal(value) => Ok(value.clone()),
            ArgSlot::Ref(name) => addresses
                .get(name)
                .map(|address| ArgValue::Address(*address))
                .ok_or_else(|| GraphError::Unresolved {
                    owner: owner.to_string(),
                    reference: name.clone(),
                }),
        })
        .collect()
}

/// Description of a single component to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Logical name, unique within a plan.
    pub name: String,
    /// Where the contract is defined.
    pub source: SourceRef,
    /// Ordered constructor argument slots.
    pub args: Vec<ArgSlot>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, source: SourceRef) -> Self {
        Self {
            name: name.into(),
            source,
            args: Vec::new(),
        }
    }

    /// Append a constructor argument slot.
    pub fn arg(mut self, slot: ArgSlot) -> Self {
        self.args.push(slot);
        self
    }

    /// Names of the components this descriptor depends on, in argument order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(ArgSlot::referenced)
    }

    /// Resolve the constructor arguments once every dependency has an address.
    pub fn resolve_args(
        &self,
        addresses: &HashMap<String, Address>,
    ) -> Result<Vec<ArgValue>, GraphError> {
        resolve_slots(&self.name, &self.args, addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ref_parse_and_display() {
        let source: SourceRef = "contracts/Vault.sol:Vault".parse().unwrap();
        assert_eq!(source.path, "contracts/Vault.sol");
        assert_eq!(source.symbol, "Vault");
        assert_eq!(source.to_string(), "contracts/Vault.sol:Vault");
    }

    #[test]
    fn test_source_ref_rejects_missing_symbol() {
        assert!("contracts/Vault.sol".parse::<SourceRef>().is_err());
        assert!("contracts/Vault.sol:".parse::<SourceRef>().is_err());
    }

    #[test]
    fn test_resolve_args_substitutes_references() {
        let controller = Address::repeat_byte(0x11);
        let asset = Address::repeat_byte(0x22);
        let vault = ComponentDescriptor::new("Vault", SourceRef::new("contracts/Vault.sol", "Vault"))
            .arg(ArgSlot::literal(asset))
            .arg(ArgSlot::reference("Controller"));

        let addresses = HashMap::from([("Controller".to_string(), controller)]);
        let args = vault.resolve_args(&addresses).unwrap();

        assert_eq!(args, vec![ArgValue::Address(asset), ArgValue::Address(controller)]);
        assert_eq!(vault.dependencies().collect::<Vec<_>>(), vec!["Controller"]);
    }

    #[test]
    fn test_resolve_args_reports_missing_reference() {
        let strategy =
            ComponentDescriptor::new("Strategy", SourceRef::new("contracts/S.sol", "S"))
                .arg(ArgSlot::reference("Controller"));

        let err = strategy.resolve_args(&HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            GraphError::Unresolved {
                owner: "Strategy".to_string(),
                reference: "Controller".to_string(),
            }
        );
    }
}
