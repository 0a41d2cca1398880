//! Shared helpers for talking to Ethereum JSON-RPC endpoints.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for a single RPC request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// A `null` result deserializes fine into an `Option<T>`. Error responses are
/// turned into an error carrying the node's message and, when present, its
/// `data` field (usually the revert payload).
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown");
        match error.get("data").filter(|d| !d.is_null()) {
            Some(data) => anyhow::bail!("RPC error on {}: {} ({})", method, message, data),
            None => anyhow::bail!("RPC error on {}: {}", method, message),
        }
    }

    let result_value = result
        .get("result")
        .cloned()
        .unwrap_or(Value::Null);

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> Result<u64, anyhow::Error> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid hex quantity: {}", value))
}

/// Encode a quantity the way JSON-RPC expects it.
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Serde helper for hex quantity fields.
pub fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// Serde helper for optional hex quantity fields (`null` while pending).
pub fn deserialize_opt_u64_from_hex<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16))
        .transpose()
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_quantities() {
        assert_eq!(parse_hex_u64("0x1a").unwrap(), 26);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert!(parse_hex_u64("0xzz").is_err());
        assert_eq!(to_hex_quantity(26), "0x1a");
    }

    #[test]
    fn test_optional_hex_field() {
        #[derive(Deserialize)]
        struct Tx {
            #[serde(
                rename = "blockNumber",
                deserialize_with = "deserialize_opt_u64_from_hex"
            )]
            block_number: Option<u64>,
        }

        let pending: Tx = serde_json::from_str(r#"{"blockNumber": null}"#).unwrap();
        assert_eq!(pending.block_number, None);

        let mined: Tx = serde_json::from_str(r#"{"blockNumber": "0x10"}"#).unwrap();
        assert_eq!(mined.block_number, Some(16));
    }
}
