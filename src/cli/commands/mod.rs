//! CLI command implementations

pub mod create;
pub mod run;
pub mod select;
pub mod status;

use crate::cli::args::{Cli, Commands};
use crate::cli::{build_orchestrator, load_config, project_dir};
use crate::models::{AppEvent, StreamKind};
use crate::pipeline::Orchestrator;
use anyhow::{Context, Result, anyhow};
use std::io::Write;
use tokio::sync::mpsc;

/// Execute a CLI command
pub async fn execute_command(command: Commands, cli: &Cli) -> Result<()> {
    match command {
        Commands::Create { parent, name, chip } => {
            create::execute_create_command(cli, parent, name, chip).await
        }
        Commands::Status => status::execute_status_command(cli).await,
        Commands::Ipsw { path } => select::execute_ipsw_command(cli, &path).await,
        Commands::Blob { path } => select::execute_blob_command(cli, &path).await,
        Commands::Chip { chip } => select::execute_chip_command(cli, chip).await,
        Commands::Run { step } => run::execute_run_command(cli, step).await,
    }
}

/// Orchestrator with the project from `--project` (or the configured
/// default) already opened
pub(crate) fn open_project_session(
    cli: &Cli,
) -> Result<(Orchestrator, mpsc::UnboundedReceiver<AppEvent>)> {
    let config = load_config(cli)?;
    let dir = project_dir(cli, &config)
        .ok_or_else(|| anyhow!("No project directory given, pass --project <DIR>"))?;
    if !dir.is_dir() {
        return Err(anyhow!(
            "Project directory does not exist: {}",
            dir.display()
        ));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let mut orchestrator = build_orchestrator(cli, &config, tx)?;
    orchestrator
        .open_project(&dir)
        .with_context(|| format!("Failed to open project {}", dir.display()))?;
    Ok((orchestrator, rx))
}

/// Print an event on the terminal the way the headless commands show them
pub(crate) fn print_event(event: &AppEvent) {
    match event {
        AppEvent::ProcessOutput(StreamKind::Command, text) => println!("{}", text),
        AppEvent::ProcessOutput(StreamKind::Stdout, text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        AppEvent::ProcessOutput(StreamKind::Stderr, text) => {
            eprint!("{}", text);
            let _ = std::io::stderr().flush();
        }
        AppEvent::Info(message) => println!("ℹ️  {}", message),
        AppEvent::Warning(message) => eprintln!("⚠️  {}", message),
        AppEvent::Error(message) => eprintln!("❌ {}", message),
        AppEvent::StepChanged(index, status) => {
            log::debug!("Step {} is now {:?}", index + 1, status)
        }
        AppEvent::ProcessFinished { .. } | AppEvent::ChainFinished(_) | AppEvent::Tick => {}
    }
}

/// Print every event queued so far
pub(crate) fn drain_events(rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
    while let Ok(event) = rx.try_recv() {
        print_event(&event);
    }
}
