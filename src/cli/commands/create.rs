//! Create command implementation

use crate::cli::args::Cli;
use crate::cli::commands::drain_events;
use crate::cli::{build_orchestrator, load_config};
use crate::models::ChipVariant;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;

pub async fn execute_create_command(
    cli: &Cli,
    parent: Option<PathBuf>,
    name: Option<String>,
    chip: Option<ChipVariant>,
) -> Result<()> {
    let config = load_config(cli)?;
    let parent = match parent {
        Some(parent) => parent,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orchestrator = build_orchestrator(cli, &config, tx)?;
    if let Some(chip) = chip {
        orchestrator.set_chip(chip)?;
    }

    let root = orchestrator
        .create_project(&parent, name.as_deref())
        .with_context(|| format!("Failed to create project in {}", parent.display()))?;
    drain_events(&mut rx);

    println!("📁 Project ready: {}", root.display());
    println!(
        "   Pipeline: {} ({} steps)",
        orchestrator.session().pipeline_label(),
        orchestrator.steps().len()
    );
    println!("   Next: m3rula -p {} ipsw <FILE>", root.display());
    Ok(())
}
