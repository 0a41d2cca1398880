//! Post-deployment wiring calls.

use std::{collections::HashMap, fmt};

use alloy_core::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::{
    abi::{self, ArgValue},
    descriptor::{ArgSlot, resolve_slots},
    graph::GraphError,
};

/// A configuration call issued against an already deployed component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringCall {
    /// Name of the component the call is sent to.
    pub target: String,
    /// Method name, without the parameter list.
    pub method: String,
    /// Ordered argument slots.
    pub args: Vec<ArgSlot>,
}

/// A wiring call with every argument resolved to a concrete value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub target: Address,
    pub signature: String,
    pub args: Vec<ArgValue>,
    pub calldata: Bytes,
}

impl WiringCall {
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument slot.
    pub fn arg(mut self, slot: ArgSlot) -> Self {
        self.args.push(slot);
        self
    }

    /// Components referenced by the arguments of this call.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(ArgSlot::referenced)
    }

    /// Short human label, e.g. `Controller.setVault`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.target, self.method)
    }

    /// Resolve target and arguments against deployed addresses and encode the calldata.
    pub fn resolve(&self, addresses: &HashMap<String, Address>) -> Result<ResolvedCall, GraphError> {
        let label = self.label();
        let target = *addresses
            .get(&self.target)
            .ok_or_else(|| GraphError::Unresolved {
                owner: label.clone(),
                reference: self.target.clone(),
            })?;
        let args = resolve_slots(&label, &self.args, addresses)?;

        Ok(ResolvedCall {
            target,
            signature: abi::signature(&self.method, &args),
            calldata: abi::encode_call(&self.method, &args),
            args,
        })
    }
}

impl fmt::Display for WiringCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// The fixed controller wiring sequence.
///
/// Order matters: the strategy must be approved before it can be activated.
pub fn controller_wiring(controller: &str, vault: &str, strategy: &str, asset: Address) -> Vec<WiringCall> {
    vec![
        WiringCall::new(controller, "setVault")
            .arg(ArgSlot::literal(asset))
            .arg(ArgSlot::reference(vault)),
        WiringCall::new(controller, "approveStrategy")
            .arg(ArgSlot::literal(asset))
            .arg(ArgSlot::reference(strategy)),
        WiringCall::new(controller, "setStrategy")
            .arg(ArgSlot::literal(asset))
            .arg(ArgSlot::reference(strategy)),
    ]
}
