//! Status command implementation

use crate::cli::args::Cli;
use crate::cli::commands::{drain_events, open_project_session};
use crate::pipeline::Session;
use anyhow::Result;
use std::path::PathBuf;

pub async fn execute_status_command(cli: &Cli) -> Result<()> {
    let (orchestrator, mut rx) = open_project_session(cli)?;
    drain_events(&mut rx);
    print!("{}", render_status(orchestrator.session()));
    Ok(())
}

/// Plain-text status report
pub fn render_status(session: &Session) -> String {
    let mut out = String::new();

    if let Some(project) = &session.project {
        out.push_str(&format!("📁 Project:   {}\n", project.root().display()));
        out.push_str(&format!(
            "   IPSW:      {}\n",
            describe(project.firmware())
        ));
        out.push_str(&format!("   Blob:      {}\n", describe(project.blob())));
        out.push_str(&format!(
            "   Generator: {}\n",
            project.generator().unwrap_or("-")
        ));
    } else {
        out.push_str("📁 Project:   none\n");
    }

    let (done, total) = session.steps.progress();
    out.push_str(&format!(
        "\n🔧 {} pipeline: {}/{} ({}%)\n",
        session.pipeline_label(),
        done,
        total,
        session.steps.progress_percent()
    ));
    let next = session.next_step();
    for (index, step) in session.steps.steps().iter().enumerate() {
        out.push_str(&format!(
            "  {} {}\n",
            step.status.symbol(next == Some(index)),
            step.label()
        ));
    }
    if !session.steps_enabled() {
        let needed = if session.mode.needs_blob() {
            "an IPSW, a blob and a generator"
        } else {
            "an IPSW"
        };
        out.push_str(&format!("  (steps disabled: select {})\n", needed));
    }

    if !session.files.is_empty() {
        out.push_str("\n📄 Files:\n");
        for file in &session.files {
            out.push_str(&format!("  {} {}\n", file.kind.symbol(), file.name));
        }
    }
    out
}

fn describe(path: Option<PathBuf>) -> String {
    match path {
        Some(path) if path.exists() => path.display().to_string(),
        Some(path) => format!("{} (missing)", path.display()),
        None => "-".to_string(),
    }
}
