//! Headless step execution
//!
//! Streams tool output to the terminal and forwards typed lines to the
//! running tool. When the chain finishes the checkpoint is shown as a prompt
//! on stdin; choosing Next Step or Retry keeps the loop going.

use crate::cli::args::Cli;
use crate::cli::commands::{drain_events, open_project_session, print_event};
use crate::models::AppEvent;
use crate::pipeline::{Checkpoint, Decision, Orchestrator};
use anyhow::{Result, anyhow};
use std::io::{BufRead, Write};
use tokio::sync::mpsc;

pub async fn execute_run_command(cli: &Cli, step: Option<usize>) -> Result<()> {
    let (mut orchestrator, mut rx) = open_project_session(cli)?;
    drain_events(&mut rx);

    if !orchestrator.session().steps_enabled() {
        return Err(anyhow!(
            "Steps are disabled for the {} pipeline until the required inputs are selected (see `m3rula status`)",
            orchestrator.session().pipeline_label()
        ));
    }
    let index = select_step(&orchestrator, step)?;

    let mut lines = spawn_stdin_lines();
    if !orchestrator.execute_step(index) {
        drain_events(&mut rx);
        return Err(anyhow!("Step {} did not start", index + 1));
    }
    drive(&mut orchestrator, &mut rx, &mut lines).await
}

fn select_step(orchestrator: &Orchestrator, step: Option<usize>) -> Result<usize> {
    let total = orchestrator.steps().len();
    match step {
        Some(number) => number
            .checked_sub(1)
            .filter(|index| *index < total)
            .ok_or_else(|| anyhow!("Step must be between 1 and {}", total)),
        None => orchestrator
            .session()
            .next_step()
            .ok_or_else(|| anyhow!("All steps completed, pass --step to run one again")),
    }
}

async fn drive(
    orchestrator: &mut Orchestrator,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    lines: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    return Err(anyhow!("Event channel closed"));
                };
                print_event(&event);
                let Some(checkpoint) = orchestrator.handle_event(&event) else {
                    continue;
                };
                drain_events(rx);

                let decision = prompt_decision(&checkpoint, lines).await;
                let started = orchestrator.apply_decision(&checkpoint, decision);
                drain_events(rx);
                if started {
                    continue;
                }
                return match decision {
                    Decision::Close => Ok(()),
                    _ if checkpoint.success && checkpoint.is_last => Ok(()),
                    _ => Err(anyhow!("Could not start the requested step")),
                };
            }
            line = lines.recv(), if stdin_open && orchestrator.is_executing() => {
                match line {
                    Some(line) if line.is_empty() => orchestrator.send_enter().await,
                    Some(line) => {
                        if let Err(e) = orchestrator.send_line(&line).await {
                            eprintln!("⚠️  Could not send input: {}", e.notice());
                        }
                    }
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c(), if orchestrator.is_executing() => {
                orchestrator.stop().await;
            }
        }
    }
}

/// Ask which of the checkpoint's options to take. Closed stdin or Ctrl+C
/// counts as Close.
async fn prompt_decision(
    checkpoint: &Checkpoint,
    lines: &mut mpsc::UnboundedReceiver<String>,
) -> Decision {
    println!("\n{}\n", checkpoint.message());
    let options = checkpoint.options();
    let hint = options
        .iter()
        .map(|decision| match decision {
            Decision::NextStep => "[n]ext step",
            Decision::Retry => "[r]etry",
            Decision::Close => "[c]lose",
        })
        .collect::<Vec<_>>()
        .join(" / ");

    loop {
        print!("{} > ", hint);
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            return Decision::Close;
        };
        if let Some(decision) = parse_decision(&line, options) {
            return decision;
        }
    }
}

/// Map operator input onto one of the offered decisions
pub fn parse_decision(input: &str, options: &[Decision]) -> Option<Decision> {
    let decision = match input.trim().to_ascii_lowercase().as_str() {
        "n" | "next" | "next step" => Decision::NextStep,
        "r" | "retry" => Decision::Retry,
        "c" | "close" | "q" | "quit" => Decision::Close,
        _ => return None,
    };
    options.contains(&decision).then_some(decision)
}

/// Read stdin on a plain thread; tokio's stdin would hold the runtime open
/// at exit while blocked on a read
fn spawn_stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
