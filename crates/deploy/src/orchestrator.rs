//! Deployment orchestrator.
//!
//! Drives a [`DeploymentPlan`] through the pipeline: deploy every component
//! along the dependency graph, issue the wiring calls one by one, wait for
//! every deployment to settle, then optionally submit verification requests.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DeployError, RunFailure},
    graph::DependencyGraph,
    pipeline::{PipelineEvent, PipelineState, Stage, transition},
    plan::DeploymentPlan,
    report::{ConfirmationState, DeployedInstance, DeploymentReport, WiringRecord},
    traits::{ArtifactFactory, ChainClient, TxRequest, VerificationClient, VerificationOutcome},
    waiter::{TransactionWaiter, WaitConfig},
};

/// Default depth a wiring call must reach before the next one is sent.
pub const DEFAULT_WIRING_CONFIRMATIONS: u64 = 1;

/// Default depth every deployment must reach before verification.
pub const DEFAULT_SETTLEMENT_CONFIRMATIONS: u64 = 5;

/// Confirmation depths required at each gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    /// Shallow depth, awaited between two wiring calls.
    pub wiring: u64,
    /// Deep depth, awaited on every deployment before any verification.
    pub settlement: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            wiring: DEFAULT_WIRING_CONFIRMATIONS,
            settlement: DEFAULT_SETTLEMENT_CONFIRMATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Network name, carried into the report.
    pub network: String,
    pub confirmations: ConfirmationPolicy,
    pub wait: WaitConfig,
}

impl OrchestratorConfig {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            confirmations: ConfirmationPolicy::default(),
            wait: WaitConfig::default(),
        }
    }
}

/// Sequences factory, chain and verifier calls for one run.
///
/// Verification is enabled by passing a verifier.
pub struct Orchestrator<'a, F, C, V> {
    factory: &'a F,
    chain: &'a C,
    verifier: Option<&'a V>,
    config: OrchestratorConfig,
}

impl<'a, F, C, V> Orchestrator<'a, F, C, V>
where
    F: ArtifactFactory,
    C: ChainClient,
    V: VerificationClient,
{
    pub fn new(
        factory: &'a F,
        chain: &'a C,
        verifier: Option<&'a V>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            factory,
            chain,
            verifier,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute the plan.
    ///
    /// Stops at the first fatal error. Nothing already sent is undone; the
    /// failure carries the partial report instead.
    pub async fn run(&self, plan: &DeploymentPlan) -> Result<DeploymentReport, RunFailure> {
        let mut state = PipelineState::default();
        let mut report = DeploymentReport::new(self.config.network.clone());

        tracing::info!(
            network = %self.config.network,
            components = plan.components.len(),
            wiring_calls = plan.wiring.len(),
            verify = self.verifier.is_some(),
            "Starting deployment run..."
        );

        match self.execute(plan, &mut state, &mut report).await {
            Ok(()) => {
                tracing::info!(network = %self.config.network, "✓ Deployment run complete");
                Ok(report)
            }
            Err(error) => {
                let stage = state.stage().unwrap_or(Stage::Idle);
                let terminal = transition(state, PipelineEvent::Fault);
                tracing::error!(
                    %stage,
                    state = ?terminal,
                    error = %error,
                    last_step = ?report.last_step,
                    "Deployment run aborted"
                );
                Err(RunFailure {
                    stage,
                    error,
                    partial: Box::new(report),
                })
            }
        }
    }

    async fn execute(
        &self,
        plan: &DeploymentPlan,
        state: &mut PipelineState,
        report: &mut DeploymentReport,
    ) -> Result<(), DeployError> {
        let graph = DependencyGraph::resolve(plan)?;
        advance(state, PipelineEvent::Begin)?;

        self.deploy(plan, &graph, report).await?;
        advance(state, PipelineEvent::Deployed)?;

        self.wire(plan, report).await?;
        advance(state, PipelineEvent::Wired)?;

        self.settle(report).await?;
        advance(
            state,
            PipelineEvent::Settled {
                verify: self.verifier.is_some(),
            },
        )?;

        if let Some(verifier) = self.verifier {
            self.verify(verifier, report).await;
            advance(state, PipelineEvent::Verified)?;
        }

        Ok(())
    }

    /// Deploy wave by wave. Members of a wave are sent concurrently.
    async fn deploy(
        &self,
        plan: &DeploymentPlan,
        graph: &DependencyGraph,
        report: &mut DeploymentReport,
    ) -> Result<(), DeployError> {
        for (index, wave) in graph.waves().iter().enumerate() {
            let addresses = report.addresses();

            tracing::info!(
                wave = index + 1,
                components = ?wave.iter().map(|&i| plan.components[i].name.as_str()).collect::<Vec<_>>(),
                "Deploying components..."
            );

            let submissions = wave.iter().map(|&i| {
                let component = &plan.components[i];
                let addresses = &addresses;
                async move {
                    let args = component.resolve_args(addresses)?;
                    let deployment = self
                        .factory
                        .deploy(&component.name, &component.source, &args)
                        .await
                        .map_err(|cause| DeployError::DeployFailure {
                            component: component.name.clone(),
                            cause,
                        })?;
                    Ok::<_, DeployError>((component, args, deployment))
                }
            });

            // Record every submission of the wave before surfacing an error,
            // so the partial report lists everything that went out.
            let mut first_error = None;
            for result in join_all(submissions).await {
                match result {
                    Ok((component, args, deployment)) => {
                        tracing::info!(
                            component = %component.name,
                            address = %deployment.address,
                            tx = %deployment.tx_hash,
                            "Deployment submitted"
                        );
                        report.instances.push(DeployedInstance {
                            name: component.name.clone(),
                            source: component.source.clone(),
                            address: deployment.address,
                            tx_hash: deployment.tx_hash,
                            constructor_args: args,
                            confirmation: ConfirmationState::Submitted,
                            verification: None,
                        });
                        report.record_step(format!(
                            "{} submitted at {}",
                            component.name, deployment.address
                        ));
                    }
                    Err(error) => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                }
            }

            if let Some(error) = first_error {
                return Err(error);
            }
        }

        Ok(())
    }

    /// Send the wiring calls strictly in order, each gated on the shallow depth.
    ///
    /// Every deployment the calls touch, as target or argument, must be mined
    /// successfully before the first call goes out.
    async fn wire(
        &self,
        plan: &DeploymentPlan,
        report: &mut DeploymentReport,
    ) -> Result<(), DeployError> {
        let waiter = TransactionWaiter::new(self.chain, self.config.wait);
        let depth = self.config.confirmations.wiring;

        self.await_wiring_dependencies(plan, report, &waiter, depth).await?;

        for call in &plan.wiring {
            let label = call.label();
            let resolved = call.resolve(&report.addresses())?;

            tracing::info!(
                call = %label,
                target = %resolved.target,
                signature = %resolved.signature,
                "Sending wiring call..."
            );

            let submitted = self
                .chain
                .send_transaction(TxRequest::call(resolved.target, resolved.calldata.clone()))
                .await
                .map_err(|cause| DeployError::WiringFailure {
                    call: label.clone(),
                    cause,
                })?;

            let confirmation = waiter
                .wait(submitted.hash, depth)
                .await
                .map_err(|e| DeployError::wiring_wait(label.clone(), e))?;

            tracing::info!(
                call = %label,
                tx = %submitted.hash,
                block = confirmation.receipt.block_number,
                "Wiring call confirmed"
            );

            report.wiring.push(WiringRecord {
                call: label.clone(),
                signature: resolved.signature,
                args: resolved.args,
                tx_hash: submitted.hash,
                block_number: confirmation.receipt.block_number,
            });
            report.record_step(format!("{label} confirmed"));
        }

        Ok(())
    }

    async fn await_wiring_dependencies(
        &self,
        plan: &DeploymentPlan,
        report: &mut DeploymentReport,
        waiter: &TransactionWaiter<'_, C>,
        depth: u64,
    ) -> Result<(), DeployError> {
        let mut names: Vec<&str> = Vec::new();
        for call in &plan.wiring {
            for name in std::iter::once(call.target.as_str()).chain(call.references()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let pending = names
            .into_iter()
            .filter_map(|name| report.instance(name))
            .map(|instance| (instance.name.clone(), instance.tx_hash))
            .collect::<Vec<_>>();
        if pending.is_empty() {
            return Ok(());
        }

        tracing::info!(
            components = ?pending.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            depth,
            "Waiting for wiring dependencies to be mined..."
        );

        let results = join_all(pending.iter().map(|(name, tx_hash)| async move {
            (name, waiter.wait(*tx_hash, depth).await)
        }))
        .await;

        for (name, result) in results {
            match result {
                Ok(confirmation) => {
                    tracing::debug!(
                        component = %name,
                        block = confirmation.receipt.block_number,
                        "Wiring dependency mined"
                    );
                }
                Err(error) => return Err(DeployError::deploy_wait(name.clone(), error)),
            }
        }

        report.record_step("wiring dependencies mined");
        Ok(())
    }

    /// Wait for every deployment to reach the settlement depth.
    async fn settle(&self, report: &mut DeploymentReport) -> Result<(), DeployError> {
        let waiter = TransactionWaiter::new(self.chain, self.config.wait);
        let depth = self.config.confirmations.settlement;

        tracing::info!(depth, "Waiting for deployments to settle...");

        let waits = report.instances.iter().map(|instance| {
            let waiter = &waiter;
            async move {
                (
                    instance.name.clone(),
                    waiter.wait(instance.tx_hash, depth).await,
                )
            }
        });
        let results = join_all(waits).await;

        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(confirmation) => {
                    tracing::info!(
                        component = %name,
                        confirmations = confirmation.confirmations,
                        block = confirmation.receipt.block_number,
                        "Deployment settled"
                    );
                    if let Some(instance) = report.instance_mut(&name) {
                        instance.confirmation = ConfirmationState::Settled {
                            confirmations: confirmation.confirmations,
                            block_number: confirmation.receipt.block_number,
                        };
                    }
                }
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(DeployError::deploy_wait(name, error));
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                report.record_step("all deployments settled");
                Ok(())
            }
        }
    }

    /// Submit one verification request per instance. Never fatal.
    async fn verify(&self, verifier: &V, report: &mut DeploymentReport) {
        let requests = report
            .instances
            .iter()
            .map(DeployedInstance::verification_request)
            .collect::<Vec<_>>();

        tracing::info!(count = requests.len(), "Submitting verification requests...");

        let outcomes = join_all(requests.iter().map(|request| verifier.verify(request))).await;

        for (request, outcome) in requests.iter().zip(outcomes) {
            match &outcome {
                VerificationOutcome::Failed(reason) => {
                    tracing::warn!(component = %request.component, address = %request.address, %reason, "Verification failed");
                }
                outcome => {
                    tracing::info!(component = %request.component, address = %request.address, %outcome, "Verification done");
                }
            }

            if let Some(instance) = report.instance_mut(&request.component) {
                instance.verification = Some(outcome);
            }
        }

        report.record_step("verification finished");
    }
}

fn advance(state: &mut PipelineState, event: PipelineEvent) -> Result<(), DeployError> {
    let next = transition(*state, event)?;
    tracing::debug!(from = ?state, to = ?next, "Pipeline transition");
    *state = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ConfirmationPolicy::default();
        assert_eq!(policy.wiring, 1);
        assert_eq!(policy.settlement, 5);

        let partial: ConfirmationPolicy = toml::from_str("settlement = 12").unwrap();
        assert_eq!(partial.wiring, 1);
        assert_eq!(partial.settlement, 12);
    }
}
