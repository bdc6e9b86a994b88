//! Project input selection commands: `ipsw`, `blob`, `chip`

use crate::cli::args::Cli;
use crate::cli::commands::{drain_events, open_project_session};
use crate::models::ChipVariant;
use crate::project::UNKNOWN_GENERATOR;
use anyhow::{Context, Result, anyhow};
use std::path::Path;

pub async fn execute_ipsw_command(cli: &Cli, path: &Path) -> Result<()> {
    let path = absolute_file(path)?;
    let (mut orchestrator, mut rx) = open_project_session(cli)?;
    orchestrator.select_firmware(&path)?;
    drain_events(&mut rx);
    Ok(())
}

pub async fn execute_blob_command(cli: &Cli, path: &Path) -> Result<()> {
    let path = absolute_file(path)?;
    let (mut orchestrator, mut rx) = open_project_session(cli)?;
    let generator = orchestrator.select_blob(&path)?;
    drain_events(&mut rx);

    if generator == UNKNOWN_GENERATOR {
        return Err(anyhow!(
            "No generator found in {}; untethered steps stay disabled",
            path.display()
        ));
    }
    Ok(())
}

pub async fn execute_chip_command(cli: &Cli, chip: ChipVariant) -> Result<()> {
    let (mut orchestrator, mut rx) = open_project_session(cli)?;
    orchestrator.set_chip(chip)?;
    drain_events(&mut rx);

    println!(
        "🔧 Pipeline: {} ({} steps)",
        orchestrator.session().pipeline_label(),
        orchestrator.steps().len()
    );
    Ok(())
}

/// Inputs are stored as absolute paths so the project works from any cwd
fn absolute_file(path: &Path) -> Result<std::path::PathBuf> {
    if !path.is_file() {
        return Err(anyhow!("File does not exist: {}", path.display()));
    }
    std::fs::canonicalize(path).with_context(|| format!("Failed to resolve {}", path.display()))
}
