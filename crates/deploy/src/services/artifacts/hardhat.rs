//! Hardhat artifact file formats.

use alloy_core::primitives::Bytes;
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::abi::{ArgValue, encode_args};

/// One parameter of an ABI entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// One entry of a contract ABI. Only the parts needed for deployment are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
}

/// A compiled contract, as written by `hardhat compile` under
/// `artifacts/<source path>/<symbol>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: Vec<AbiEntry>,
    /// Creation bytecode.
    pub bytecode: Bytes,
}

impl Artifact {
    /// Constructor parameters; empty when the contract declares no constructor.
    pub fn constructor_inputs(&self) -> &[AbiParam] {
        self.abi
            .iter()
            .find(|entry| entry.kind == "constructor")
            .map(|entry| entry.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Check arity and types of constructor arguments against the ABI.
    pub fn check_constructor_args(&self, args: &[ArgValue]) -> Result<(), anyhow::Error> {
        let inputs = self.constructor_inputs();

        if inputs.len() != args.len() {
            anyhow::bail!(
                "{} constructor takes {} argument(s), got {}",
                self.contract_name,
                inputs.len(),
                args.len()
            );
        }

        for (position, (input, arg)) in inputs.iter().zip(args).enumerate() {
            if input.ty != arg.abi_type() {
                anyhow::bail!(
                    "{} constructor argument {} ({}) expects {}, got {}",
                    self.contract_name,
                    position,
                    input.name,
                    input.ty,
                    arg.abi_type()
                );
            }
        }

        Ok(())
    }

    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn init_code(&self, args: &[ArgValue]) -> Result<Bytes, anyhow::Error> {
        if self.bytecode.is_empty() {
            anyhow::bail!(
                "{} has no creation bytecode (abstract contract or interface?)",
                self.contract_name
            );
        }
        self.check_constructor_args(args)?;

        let mut code = self.bytecode.to_vec();
        code.extend(encode_args(args));
        Ok(Bytes::from(code))
    }
}

/// Debug file next to an artifact, pointing at its build info.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DebugFile {
    /// Path of the build info file, relative to the debug file.
    pub build_info: String,
}

/// Compiler run that produced an artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// E.g. `0.6.12+commit.27d51765`.
    pub solc_long_version: String,
    /// Standard JSON input handed to the compiler.
    pub input: serde_json::Value,
}

impl BuildInfo {
    /// Compiler version as verification services expect it.
    pub fn compiler_version(&self) -> String {
        format!("v{}", self.solc_long_version)
    }

    pub fn standard_json_input(&self) -> Result<String, anyhow::Error> {
        serde_json::to_string(&self.input).context("Failed to serialize compiler input")
    }
}
