//! Command Line Interface module
//!
//! This module contains the CLI argument parsing, command implementations,
//! and the Terminal User Interface (TUI) components.

pub mod args;
pub mod commands;
pub mod tui;

pub use args::*;

use crate::config::AppConfig;
use crate::models::AppEvent;
use crate::pipeline::Orchestrator;
use crate::utils::logging::init_cli_logging;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Main CLI application runner
pub async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_cli_logging(cli.verbose, cli.quiet, cli.command.is_none())?;

    match &cli.command {
        Some(command) => commands::execute_command(command.clone(), &cli).await,
        None => tui::run_tui(cli).await,
    }
}

/// Load the configuration file and apply command line overrides
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(rain) = &cli.rain {
        config.tools.rain = Some(rain.clone());
    }
    if let Some(merula) = &cli.merula {
        config.tools.merula = Some(merula.clone());
    }
    Ok(config)
}

/// Project directory from `--project`, falling back to the configured default
pub fn project_dir(cli: &Cli, config: &AppConfig) -> Option<PathBuf> {
    cli.project_dir
        .clone()
        .or_else(|| config.default_project_dir.clone())
}

/// Build an orchestrator in the mode requested on the command line
pub fn build_orchestrator(
    cli: &Cli,
    config: &AppConfig,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> Result<Orchestrator> {
    let tools = config.resolve_tools();
    log::debug!(
        "Using turdusra1n at {}, turdus_merula at {}",
        tools.rain.display(),
        tools.merula.display()
    );

    let mut orchestrator = Orchestrator::new(config, tools, tx);
    orchestrator.set_mode(cli.mode)?;
    Ok(orchestrator)
}
