//! TUI event loop and handling

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{io, time::Duration};
use tokio::sync::mpsc;

use crate::cli::tui::app::App;
use crate::cli::tui::ui::ui;
use crate::models::AppEvent;

/// Run the main TUI event loop
pub async fn run_tui_event_loop(
    mut app: App,
    tx: mpsc::UnboundedSender<AppEvent>,
    mut rx: mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Spawn tick generator
    let tick = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|f| ui(f, &app)) {
            break Err(e.into());
        }
        if app.should_quit {
            break Ok(());
        }

        tokio::select! {
            polled = tokio::task::spawn_blocking(|| event::poll(Duration::from_millis(50))) => {
                if !matches!(polled, Ok(Ok(true))) {
                    continue;
                }
                match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        app.handle_key(key).await;
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e.into()),
                }
            }

            Some(event) = rx.recv() => {
                app.handle_app_event(event);
                // Drain whatever else is queued before redrawing
                while let Ok(event) = rx.try_recv() {
                    app.handle_app_event(event);
                }
            }
        }
    };

    tick.abort();
    if app.orchestrator.is_executing() {
        app.orchestrator.stop().await;
    }

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
