//! strat deploys a Controller / Vault / Strategy stack, wires it, waits for
//! settlement and optionally verifies the sources.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, OutputFormat};
use strat_deploy::traits::ChainClient;
use strat_deploy::{
    ArtifactStore, ChainArtifactFactory, DeploymentRecord, DeploymentReport, EtherscanVerifier,
    Orchestrator, RpcChainClient, run_compile,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = cli.load_config()?;
    let network = config.network(&cli.network)?;

    tracing::info!(
        network = %cli.network,
        rpc_url = %network.rpc_url,
        artifacts = %config.artifacts_dir.display(),
        verify = cli.verify,
        "Loading deployment..."
    );

    if let Some(command) = config.compile.as_ref().filter(|_| !cli.no_compile) {
        let workdir = std::env::current_dir().context("Failed to resolve working directory")?;
        run_compile(command, &workdir).await?;
    }

    let chain = RpcChainClient::connect(network.rpc_url.clone(), network.from).await?;
    let chain_id = chain.chain_id().await?;
    if let Some(expected) = network.chain_id.filter(|expected| *expected != chain_id) {
        anyhow::bail!(
            "Network '{}' expects chain id {}, but the node reports {}",
            cli.network,
            expected,
            chain_id
        );
    }

    let stack = config.stack.build(chain.sender());
    let plan = stack.plan();
    let plan_hash = plan.compute_hash()?;

    tracing::info!(
        chain_id,
        sender = %chain.sender(),
        asset = %stack.asset,
        owner = %stack.owner,
        governance = %stack.governance,
        %plan_hash,
        "Deployment plan ready"
    );

    let store = ArtifactStore::new(&config.artifacts_dir);
    let factory = ChainArtifactFactory::new(&store, &chain);
    let verifier = if cli.verify {
        let etherscan = config.verification.etherscan_config(network, chain_id)?;
        Some(EtherscanVerifier::new(etherscan, store.clone())?)
    } else {
        None
    };

    let orchestrator = Orchestrator::new(
        &factory,
        &chain,
        verifier.as_ref(),
        network.orchestrator_config(&cli.network),
    );
    let record_dir = config.record_dir(&cli.network);

    match orchestrator.run(&plan).await {
        Ok(report) => {
            let record_path =
                DeploymentRecord::from_report(chain_id, plan_hash, &report).save_in(&record_dir)?;
            print_report(&report, cli.output)?;

            let warnings = report.verification_warnings();
            for (component, reason) in &warnings {
                tracing::warn!(component, reason, "Verification failed; the deployment stands");
            }
            if config.verification.strict && !warnings.is_empty() {
                anyhow::bail!(
                    "{} verification(s) failed and strict verification is enabled",
                    warnings.len()
                );
            }

            tracing::info!(record = %record_path.display(), "✓ Deployment complete!");
            Ok(())
        }
        Err(failure) => {
            let record = DeploymentRecord::from_report(chain_id, plan_hash, &failure.partial)
                .failed(failure.stage, &failure.error);
            if let Err(e) = record.save_in(&record_dir) {
                tracing::error!(error = %e, "Failed to save the partial deployment record");
            }

            tracing::error!(
                stage = %failure.stage,
                last_step = ?failure.partial.last_step,
                "Deployment stopped; nothing was rolled back. Already issued:"
            );
            print_report(&failure.partial, cli.output)?;

            Err(failure.into())
        }
    }
}

fn print_report(report: &DeploymentReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", report.to_table()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialize report")?
        ),
    }
    Ok(())
}
