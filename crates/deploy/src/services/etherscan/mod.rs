//! Source verification against an Etherscan-compatible explorer API.
//!
//! A request is submitted once with `verifysourcecode` (retried while the
//! explorer has not indexed the contract yet), then its GUID is polled with
//! `checkverifystatus` until it leaves the queue.

mod api;

use std::time::Duration;

use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use url::Url;

use self::api::{ApiResponse, ExplorerError, Submission, classify_status, classify_submission};
use crate::{
    abi::encode_args,
    rpc::create_client,
    services::artifacts::ArtifactStore,
    traits::{VerificationClient, VerificationOutcome, VerificationRequest},
};

/// Default explorer endpoint; the chain is selected with `chainid`.
pub const DEFAULT_API_URL: &str = "https://api.etherscan.io/v2/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtherscanConfig {
    pub api_url: Url,
    pub api_key: String,
    pub chain_id: u64,
    /// Delay between two submissions or status polls.
    pub poll_interval: Duration,
    /// Upper bound on retries of each phase.
    pub max_polls: usize,
}

/// [`VerificationClient`] for Etherscan and its clones.
pub struct EtherscanVerifier {
    client: reqwest::Client,
    config: EtherscanConfig,
    store: ArtifactStore,
}

impl EtherscanVerifier {
    pub fn new(config: EtherscanConfig, store: ArtifactStore) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: create_client()?,
            config,
            store,
        })
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.config.poll_interval)
            .with_max_times(self.config.max_polls)
    }

    async fn request(&self, form: &[(&str, String)]) -> Result<ApiResponse, ExplorerError> {
        let response = self
            .client
            .post(self.config.api_url.clone())
            .query(&[("chainid", self.config.chain_id)])
            .form(form)
            .send()
            .await
            .context("Failed to reach the explorer API")?;

        let body = response
            .json::<ApiResponse>()
            .await
            .context("Failed to parse explorer response")?;

        Ok(body)
    }

    fn submission_form(
        &self,
        request: &VerificationRequest,
    ) -> Result<Vec<(&'static str, String)>, anyhow::Error> {
        let build_info = self
            .store
            .load_build_info(&request.source)
            .with_context(|| format!("No compiler input for {}", request.source))?;

        Ok(vec![
            ("apikey", self.config.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", build_info.standard_json_input()?),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", request.source.to_string()),
            ("compilerversion", build_info.compiler_version()),
            // Sic: the API spells it this way.
            (
                "constructorArguements",
                hex::encode(encode_args(&request.constructor_args)),
            ),
        ])
    }

    async fn submit(&self, form: &[(&str, String)]) -> Result<Submission, ExplorerError> {
        classify_submission(&self.request(form).await?)
    }

    async fn check(&self, guid: &str) -> Result<VerificationOutcome, ExplorerError> {
        let form = [
            ("apikey", self.config.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "checkverifystatus".to_string()),
            ("guid", guid.to_string()),
        ];
        classify_status(&self.request(&form).await?)
    }

    async fn try_verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationOutcome, ExplorerError> {
        let form = self.submission_form(request)?;

        let submission = (|| self.submit(&form))
            .retry(self.backoff())
            .when(ExplorerError::is_retryable)
            .notify(|err, delay| {
                tracing::debug!(component = %request.component, error = %err, ?delay, "Explorer not ready, resubmitting...");
            })
            .await?;

        let guid = match submission {
            Submission::AlreadyVerified => return Ok(VerificationOutcome::AlreadyVerified),
            Submission::Queued(guid) => guid,
        };

        tracing::debug!(component = %request.component, %guid, "Verification queued");

        (|| self.check(&guid))
            .retry(self.backoff())
            .when(ExplorerError::is_retryable)
            .notify(|err, delay| {
                tracing::trace!(component = %request.component, status = %err, ?delay, "Verification still queued");
            })
            .await
    }
}

impl VerificationClient for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome {
        tracing::info!(
            component = %request.component,
            address = %request.address,
            source = %request.source,
            "Submitting source for verification..."
        );

        match self.try_verify(request).await {
            Ok(outcome) => outcome,
            Err(err) => VerificationOutcome::Failed(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use alloy_core::primitives::Address;
    use mockito::Matcher;
    use tempdir::TempDir;

    use super::*;
    use crate::{abi::ArgValue, descriptor::SourceRef};

    fn write(path: &std::path::Path, content: &serde_json::Value) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content.to_string()).unwrap();
    }

    /// An artifact store holding the build info of `contracts/Vault.sol:Vault`.
    fn store(dir: &TempDir) -> ArtifactStore {
        write(
            &dir.path().join("contracts/Vault.sol/Vault.dbg.json"),
            &serde_json::json!({ "buildInfo": "../../build-info/b1.json" }),
        );
        write(
            &dir.path().join("build-info/b1.json"),
            &serde_json::json!({
                "solcLongVersion": "0.6.12+commit.27d51765",
                "input": { "language": "Solidity", "sources": {} }
            }),
        );
        ArtifactStore::new(dir.path())
    }

    fn verifier(server: &mockito::ServerGuard, dir: &TempDir, max_polls: usize) -> EtherscanVerifier {
        let config = EtherscanConfig {
            api_url: Url::parse(&format!("{}/api", server.url())).unwrap(),
            api_key: "KEY".to_string(),
            chain_id: 137,
            poll_interval: Duration::from_millis(1),
            max_polls,
        };
        EtherscanVerifier::new(config, store(dir)).unwrap()
    }

    fn request() -> VerificationRequest {
        VerificationRequest {
            component: "Vault".to_string(),
            address: Address::repeat_byte(0x0a),
            source: SourceRef::new("contracts/Vault.sol", "Vault"),
            constructor_args: vec![ArgValue::Address(Address::repeat_byte(0x0c))],
        }
    }

    fn body(status: &str, message: &str, result: &str) -> Vec<u8> {
        serde_json::json!({ "status": status, "message": message, "result": result })
            .to_string()
            .into_bytes()
    }

    fn action(name: &str) -> Matcher {
        Matcher::UrlEncoded("action".to_string(), name.to_string())
    }

    #[tokio::test]
    async fn test_resubmits_until_the_contract_is_indexed() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new("strat-etherscan").unwrap();

        let submissions = Arc::new(AtomicUsize::new(0));
        let seen = submissions.clone();
        let submit = server
            .mock("POST", Matcher::Regex("^/api".to_string()))
            .match_body(action("verifysourcecode"))
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    body("0", "NOTOK", "Unable to locate ContractCode at 0x0a0a")
                } else {
                    body("1", "OK", "guid-1")
                }
            })
            .expect(3)
            .create_async()
            .await;

        let polls = Arc::new(AtomicUsize::new(0));
        let seen = polls.clone();
        let check = server
            .mock("POST", Matcher::Regex("^/api".to_string()))
            .match_body(Matcher::AllOf(vec![
                action("checkverifystatus"),
                Matcher::UrlEncoded("guid".to_string(), "guid-1".to_string()),
            ]))
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    body("0", "NOTOK", "Pending in queue")
                } else {
                    body("1", "OK", "Pass - Verified")
                }
            })
            .expect(2)
            .create_async()
            .await;

        let outcome = verifier(&server, &dir, 5).verify(&request()).await;

        assert_eq!(outcome, VerificationOutcome::Verified);
        submit.assert_async().await;
        check.assert_async().await;
    }

    #[tokio::test]
    async fn test_exhausted_polls_become_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new("strat-etherscan").unwrap();

        server
            .mock("POST", Matcher::Regex("^/api".to_string()))
            .match_body(action("verifysourcecode"))
            .with_header("content-type", "application/json")
            .with_body(body("1", "OK", "guid-2"))
            .create_async()
            .await;
        let check = server
            .mock("POST", Matcher::Regex("^/api".to_string()))
            .match_body(action("checkverifystatus"))
            .with_header("content-type", "application/json")
            .with_body(body("0", "NOTOK", "Pending in queue"))
            .expect(3)
            .create_async()
            .await;

        let outcome = verifier(&server, &dir, 2).verify(&request()).await;

        match outcome {
            VerificationOutcome::Failed(reason) => assert!(reason.contains("Pending in queue")),
            other => panic!("expected a failure, got {other:?}"),
        }
        check.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_submission_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new("strat-etherscan").unwrap();

        let submit = server
            .mock("POST", Matcher::Regex("^/api".to_string()))
            .match_query(Matcher::UrlEncoded("chainid".to_string(), "137".to_string()))
            .match_body(action("verifysourcecode"))
            .with_header("content-type", "application/json")
            .with_body(body("0", "NOTOK", "Invalid API Key"))
            .expect(1)
            .create_async()
            .await;

        let outcome = verifier(&server, &dir, 5).verify(&request()).await;

        assert_eq!(
            outcome,
            VerificationOutcome::Failed("Invalid API Key".to_string())
        );
        submit.assert_async().await;
    }
}
