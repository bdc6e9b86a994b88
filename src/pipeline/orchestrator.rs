//! Step orchestration
//!
//! The [`Orchestrator`] owns the session (project, active step list,
//! executing flag, pending completion) and the process runner. Front-ends
//! feed it runner events and operator decisions; it never advances to the
//! next step on its own, because the device has to be put back into DFU
//! mode by hand between steps.

use crate::config::{AppConfig, ToolPaths};
use crate::errors::{M3rulaError, Result};
use crate::event_log;
use crate::models::{AppEvent, ChipVariant, RestoreMode, Step, StepKind, StepStatus};
use crate::pipeline::artifacts::{
    Resolution, flatten_working_dirs, prepare_working_dirs, resolve_artifact,
};
use crate::pipeline::behaviors::{Completion, StepContext, plan_step};
use crate::pipeline::manager::StepManager;
use crate::pipeline::progress::detect_progress;
use crate::pipeline::steps::build_steps;
use crate::project::{
    ProjectFile, ProjectState, UNKNOWN_GENERATOR, default_project_name, extract_generator,
    list_project_files,
};
use crate::services::ProcessRunner;
use crate::utils::logging::EventLogger;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// What the operator can do once a step has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NextStep,
    Retry,
    Close,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::NextStep => "Next Step",
            Decision::Retry => "Retry",
            Decision::Close => "Close",
        }
    }
}

/// Manual checkpoint presented after every chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub index: usize,
    pub step_name: &'static str,
    pub success: bool,
    pub is_last: bool,
}

impl Checkpoint {
    pub fn options(&self) -> &'static [Decision] {
        match (self.success, self.is_last) {
            (true, false) => &[Decision::NextStep, Decision::Close],
            (true, true) => &[Decision::Close],
            (false, _) => &[Decision::Retry, Decision::Close],
        }
    }

    pub fn message(&self) -> String {
        match (self.success, self.is_last) {
            (true, true) => format!(
                "✓ Step completed successfully!\n\n{}\n\nDevice boot completed!",
                self.step_name
            ),
            (true, false) => format!(
                "✓ Step completed successfully!\n\n{}\n\nPlease re-enter DFU mode before next step.",
                self.step_name
            ),
            (false, _) => format!(
                "✗ Step failed!\n\n{}\n\nPlease re-enter DFU mode before retry.",
                self.step_name
            ),
        }
    }
}

/// Everything the orchestration operations act on
#[derive(Debug)]
pub struct Session {
    pub project: Option<ProjectState>,
    pub chip: ChipVariant,
    pub mode: RestoreMode,
    pub steps: StepManager,
    pub executing: bool,
    pub files: Vec<ProjectFile>,
    pending: Option<Completion>,
}

impl Session {
    fn new(steps: StepManager) -> Self {
        Self {
            project: None,
            chip: ChipVariant::default(),
            mode: RestoreMode::default(),
            steps,
            executing: false,
            files: Vec::new(),
            pending: None,
        }
    }

    /// Tethered needs a firmware image; untethered also needs a usable blob
    pub fn steps_enabled(&self) -> bool {
        let Some(project) = &self.project else {
            return false;
        };
        if project.firmware().is_none() {
            return false;
        }
        if self.mode.needs_blob() {
            return project.blob().is_some()
                && project
                    .generator()
                    .is_some_and(|generator| generator != UNKNOWN_GENERATOR);
        }
        true
    }

    pub fn next_step(&self) -> Option<usize> {
        self.steps.next_pending()
    }

    /// e.g. "A9 Tethered"
    pub fn pipeline_label(&self) -> String {
        format!("{} {}", self.chip, self.mode)
    }
}

pub struct Orchestrator {
    session: Session,
    runner: ProcessRunner,
    tools: ToolPaths,
    log: EventLogger,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, tools: ToolPaths, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        let mut orchestrator = Self {
            session: Session::new(StepManager::new(tx.clone())),
            runner: ProcessRunner::new(config.runner.clone(), tx.clone()),
            tools,
            log: EventLogger::new(tx),
        };
        orchestrator.reload_steps();
        orchestrator
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn steps(&self) -> &[Step] {
        self.session.steps.steps()
    }

    pub fn is_executing(&self) -> bool {
        self.session.executing
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    // Project operations

    pub fn open_project(&mut self, dir: &Path) -> Result<()> {
        if self.session.executing {
            return Err(M3rulaError::Project(
                "Cannot change project while a step is running".to_string(),
            ));
        }
        let (state, created) = ProjectState::open(dir)?;
        if created {
            event_log!(self.log, info, "Created new project: {}", dir.display());
        } else {
            event_log!(self.log, info, "Loaded existing project: {}", dir.display());
        }
        if let Some(ipsw) = state.firmware().filter(|p| !p.exists()) {
            event_log!(self.log, warning, "IPSW no longer exists: {}", ipsw.display());
        }

        self.session.chip = state.chip();
        self.session.project = Some(state);
        self.reload_steps();
        Ok(())
    }

    /// Create `parent/<name>` and open it. Without a name the default
    /// `<chip>_<mode>_<timestamp>` is used.
    pub fn create_project(&mut self, parent: &Path, name: Option<&str>) -> Result<PathBuf> {
        let name = match name {
            Some(name) => name.to_string(),
            None => default_project_name(self.session.chip, self.session.mode, Local::now()),
        };
        if name.trim().is_empty() {
            return Err(M3rulaError::Project("project name is empty".to_string()));
        }
        let root = parent.join(&name);
        fs::create_dir_all(&root)?;

        // A fresh project.json defaults to A9; keep what the operator picked
        let chip = self.session.chip;
        self.open_project(&root)?;
        if self.session.chip != chip {
            self.set_chip(chip)?;
        }
        Ok(root)
    }

    pub fn select_firmware(&mut self, path: &Path) -> Result<()> {
        let project = self.project_mut()?;
        project.set_firmware(path)?;
        event_log!(self.log, info, "Selected IPSW: {}", display_name(path));
        Ok(())
    }

    /// Record the blob and the generator extracted from it
    pub fn select_blob(&mut self, path: &Path) -> Result<String> {
        let generator = extract_generator(path);
        let project = self.project_mut()?;
        project.set_blob(path, generator.clone())?;
        event_log!(self.log, info, "Selected Blob: {}", display_name(path));
        if generator == UNKNOWN_GENERATOR {
            event_log!(self.log, warning, "Generator: {} (not found in blob)", generator);
        } else {
            event_log!(self.log, info, "Generator: {}", generator);
        }
        Ok(generator)
    }

    pub fn set_chip(&mut self, chip: ChipVariant) -> Result<()> {
        self.ensure_idle()?;
        self.session.chip = chip;
        if let Some(project) = self.session.project.as_mut() {
            project.set_chip(chip)?;
        }
        self.reload_steps();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: RestoreMode) -> Result<()> {
        self.ensure_idle()?;
        self.session.mode = mode;
        self.reload_steps();
        Ok(())
    }

    /// Rebuild the step list for the current chip and mode and re-derive
    /// progress from disk
    pub fn reload_steps(&mut self) {
        self.session.pending = None;
        self.session
            .steps
            .set_steps(build_steps(self.session.chip, self.session.mode));
        if let Some(project) = &self.session.project {
            detect_progress(&mut self.session.steps, project.root());
        }
        self.refresh_files();
    }

    pub fn refresh_files(&mut self) {
        self.session.files = match &self.session.project {
            Some(project) => match list_project_files(project.root()) {
                Ok(files) => files,
                Err(e) => {
                    log::warn!("Failed to list project files: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
    }

    // Step execution

    /// Start step `index`. Returns true if a command chain was started.
    /// Missing inputs fail the step immediately with a warning.
    pub fn execute_step(&mut self, index: usize) -> bool {
        if self.session.executing || self.runner.is_running() {
            event_log!(self.log, warning, "A step is already running");
            return false;
        }
        let Some(step) = self.session.steps.get(index).cloned() else {
            log::warn!("No step at index {}", index);
            return false;
        };

        self.session.steps.start_step(index);
        self.session.executing = true;
        event_log!(self.log, info, "Step {}: {}", step.ordinal, step.name);

        match self.launch(step.kind) {
            Ok(()) => true,
            Err(M3rulaError::Precondition(message)) => {
                self.log.warning(message);
                self.fail_current(index);
                false
            }
            Err(e) => {
                event_log!(self.log, error, "Error: {}", e);
                self.fail_current(index);
                false
            }
        }
    }

    fn launch(&mut self, kind: StepKind) -> Result<()> {
        let project = self
            .session
            .project
            .as_ref()
            .ok_or_else(|| M3rulaError::Precondition("Need project".to_string()))?;
        let plan = plan_step(
            kind,
            &StepContext {
                project,
                tools: &self.tools,
            },
        )?;
        prepare_working_dirs(project.root())?;

        if let Some(note) = plan.note {
            self.log.info(note.to_string());
        }
        self.session.pending = plan.completion;
        if !self.runner.run_chain(plan.commands) {
            self.session.pending = None;
            return Err(M3rulaError::Process(
                "runner refused to start the command chain".to_string(),
            ));
        }
        Ok(())
    }

    fn fail_current(&mut self, index: usize) {
        self.session.steps.complete_step(index, false);
        self.session.executing = false;
    }

    /// Feed a runner event. Returns a checkpoint when a step has finished.
    pub fn handle_event(&mut self, event: &AppEvent) -> Option<Checkpoint> {
        match event {
            AppEvent::ProcessFinished { success, exit_code } => {
                let status = if *success { "OK" } else { "FAIL" };
                event_log!(self.log, info, "Process {} (code: {})", status, exit_code);
                None
            }
            AppEvent::ChainFinished(success) => self.on_chain_finished(*success),
            _ => None,
        }
    }

    /// Flatten working dirs, apply the pending completion, record the result
    /// and build the operator checkpoint
    pub fn on_chain_finished(&mut self, success: bool) -> Option<Checkpoint> {
        self.session.executing = false;
        let index = self.session.steps.current()?;
        let step = self.session.steps.get(index)?.clone();
        if step.status != StepStatus::Running {
            log::debug!("Ignoring chain result for step {} ({:?})", index, step.status);
            return None;
        }

        let completion = self.session.pending.take();
        let mut final_success = success;
        if let Some(project) = &self.session.project {
            let root = project.root().to_path_buf();
            match flatten_working_dirs(&root) {
                Ok(moved) => {
                    for name in moved {
                        event_log!(self.log, info, "Moved from {}", name);
                    }
                }
                Err(e) => event_log!(self.log, warning, "Failed to flatten working dirs: {}", e),
            }
            if let Some(completion) = completion {
                final_success = self.apply_completion(completion, success, &root);
            }
        }

        self.session.steps.complete_step(index, final_success);
        self.refresh_files();

        Some(Checkpoint {
            index,
            step_name: step.name,
            success: final_success,
            is_last: self.session.steps.is_last(index),
        })
    }

    fn apply_completion(&self, completion: Completion, success: bool, root: &Path) -> bool {
        if !success {
            return false;
        }
        match completion {
            Completion::TouchMarker(marker) => match fs::write(root.join(marker), b"") {
                Ok(()) => true,
                Err(e) => {
                    event_log!(self.log, error, "Error: cannot create {}: {}", marker, e);
                    false
                }
            },
            Completion::ResolveArtifact { target, exclude } => {
                match resolve_artifact(root, target, exclude) {
                    Ok(Resolution::AlreadyPresent) => {
                        event_log!(self.log, info, "Saved: {}", target);
                        true
                    }
                    Ok(Resolution::Renamed { from }) => {
                        event_log!(self.log, info, "Renamed {} to {}", from, target);
                        true
                    }
                    Err(M3rulaError::Artifact(_)) => {
                        event_log!(self.log, error, "Error: No .bin file found, no artifact produced for {}", target);
                        false
                    }
                    Err(e) => {
                        event_log!(self.log, error, "Error: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Act on the operator's choice. Returns true if a new chain started.
    pub fn apply_decision(&mut self, checkpoint: &Checkpoint, decision: Decision) -> bool {
        if !checkpoint.options().contains(&decision) {
            log::warn!("{:?} is not offered for this checkpoint", decision);
            return false;
        }
        match decision {
            Decision::NextStep => {
                self.log.info("User chose: Next Step".to_string());
                let next = checkpoint.index + 1;
                if next < self.session.steps.len() {
                    self.execute_step(next)
                } else {
                    self.log.info("All steps completed!".to_string());
                    false
                }
            }
            Decision::Retry => {
                self.log
                    .info("User chose: Retry (Please re-enter DFU mode)".to_string());
                self.execute_step(checkpoint.index)
            }
            Decision::Close => {
                self.log.info("User chose: Close".to_string());
                false
            }
        }
    }

    // Operator controls

    /// Send a bare newline to a tool waiting on a key press
    pub async fn send_enter(&mut self) {
        match self.runner.send_input("").await {
            Ok(()) => self.log.info("Sent: ENTER".to_string()),
            Err(e) => event_log!(self.log, warning, "Could not send ENTER: {}", e.notice()),
        }
    }

    /// Forward a line typed by the operator to the running tool
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        self.runner.send_input(text).await
    }

    /// Kill the running chain. The step stays executing until the runner's
    /// `ChainFinished(false)` is fed back through [`Self::handle_event`],
    /// which fails it and raises the Retry/Close checkpoint.
    pub async fn stop(&mut self) {
        if !self.session.executing {
            return;
        }
        self.runner.stop().await;
        self.log.info("Stopped".to_string());
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.session.executing {
            Err(M3rulaError::Project(
                "Cannot switch pipeline while a step is running".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn project_mut(&mut self) -> Result<&mut ProjectState> {
        self.session.project.as_mut().ok_or_else(|| {
            M3rulaError::Project("Please open or create a project first".to_string())
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_options() {
        let mut checkpoint = Checkpoint {
            index: 0,
            step_name: "Get SHC (pre)",
            success: true,
            is_last: false,
        };
        assert_eq!(checkpoint.options(), &[Decision::NextStep, Decision::Close]);
        assert!(checkpoint.message().contains("re-enter DFU mode before next step"));

        checkpoint.is_last = true;
        assert_eq!(checkpoint.options(), &[Decision::Close]);
        assert!(checkpoint.message().contains("Device boot completed!"));

        checkpoint.success = false;
        assert_eq!(checkpoint.options(), &[Decision::Retry, Decision::Close]);
        assert!(checkpoint.message().contains("before retry"));
    }

    #[tokio::test]
    async fn test_execute_without_project_fails_fast() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut orchestrator =
            Orchestrator::new(&AppConfig::default(), ToolPaths::new("true", "true"), tx);

        assert!(!orchestrator.execute_step(0));
        assert!(!orchestrator.is_executing());
        assert_eq!(orchestrator.steps()[0].status, StepStatus::Failed);

        let mut warned = false;
        while let Ok(event) = rx.try_recv() {
            if event == AppEvent::Warning("Need project".to_string()) {
                warned = true;
            }
        }
        assert!(warned);
    }

    #[tokio::test]
    async fn test_select_firmware_requires_project() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut orchestrator =
            Orchestrator::new(&AppConfig::default(), ToolPaths::new("true", "true"), tx);
        let err = orchestrator
            .select_firmware(Path::new("/fw/a.ipsw"))
            .unwrap_err();
        assert!(matches!(err, M3rulaError::Project(_)));
        assert!(!orchestrator.session().steps_enabled());
    }
}
