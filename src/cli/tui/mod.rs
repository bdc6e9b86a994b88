//! Terminal User Interface components

pub mod app;
pub mod event_loop;
pub mod ui;


use crate::cli::args::Cli;
use crate::cli::{build_orchestrator, load_config, project_dir};
use crate::models::tui::PathPrompt;
use anyhow::{Context, Result};
use tokio::sync::mpsc;

/// Run the Terminal User Interface
pub async fn run_tui(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = build_orchestrator(&cli, &config, tx.clone())?;

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let mut app = app::App::new(orchestrator, cwd);

    if let Some(dir) = project_dir(&cli, &config) {
        let dir = if dir.is_absolute() { dir } else { app.project_parent.join(dir) };
        app.submit_path(PathPrompt::OpenProject, &dir);
    }

    event_loop::run_tui_event_loop(app, tx, rx).await
}
