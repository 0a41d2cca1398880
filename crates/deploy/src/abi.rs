//! Minimal ABI encoding for constructor arguments and wiring calls.
//!
//! Only static 32-byte types are supported, which covers everything the
//! strategy stack passes around (addresses, amounts, flags and hashes).

use alloy_core::primitives::{Address, B256, Bytes, U256, keccak256};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// A constructor or call argument with a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    #[display("{_0}")]
    Address(Address),
    #[display("{_0}")]
    Uint256(U256),
    #[display("{_0}")]
    Bool(bool),
    #[display("{_0}")]
    Bytes32(B256),
}

impl ArgValue {
    /// The canonical ABI type name, as used in function signatures.
    pub fn abi_type(&self) -> &'static str {
        match self {
            ArgValue::Address(_) => "address",
            ArgValue::Uint256(_) => "uint256",
            ArgValue::Bool(_) => "bool",
            ArgValue::Bytes32(_) => "bytes32",
        }
    }

    /// Encode the value as a single 32-byte ABI word.
    pub fn encode_word(&self) -> B256 {
        match self {
            ArgValue::Address(address) => address.into_word(),
            ArgValue::Uint256(value) => B256::from(value.to_be_bytes::<32>()),
            ArgValue::Bool(flag) => B256::from(U256::from(*flag as u8).to_be_bytes::<32>()),
            ArgValue::Bytes32(word) => *word,
        }
    }
}

/// ABI-encode a list of static arguments (head words only).
pub fn encode_args(args: &[ArgValue]) -> Vec<u8> {
    args.iter()
        .flat_map(|arg| arg.encode_word().0)
        .collect()
}

/// Build the canonical signature of a function, e.g. `setVault(address,address)`.
pub fn signature(method: &str, args: &[ArgValue]) -> String {
    let types: Vec<&str> = args.iter().map(ArgValue::abi_type).collect();
    format!("{}({})", method, types.join(","))
}

/// Compute the 4-byte function selector of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Encode a full call: selector followed by the encoded arguments.
pub fn encode_call(method: &str, args: &[ArgValue]) -> Bytes {
    let mut data = selector(&signature(method, args)).to_vec();
    data.extend(encode_args(args));
    data.into()
}
