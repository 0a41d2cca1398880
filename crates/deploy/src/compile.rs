//! Optional compilation step run before deploying.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::process::Command;

/// Run the configured compile command in `workdir`.
///
/// A non-zero exit aborts before anything is sent on chain.
pub async fn run_compile(command: &[String], workdir: &Path) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("Compile command is empty");
    };

    tracing::info!(command = %command.join(" "), "Compiling contracts...");

    let output = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .output()
        .await
        .with_context(|| format!("Failed to run compile command '{}'", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "Compile command exited with {}: {}",
            output.status,
            stderr.trim()
        );
    }

    tracing::debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "Compilation output");
    tracing::info!("✓ Contracts compiled");
    Ok(())
}
