//! TUI application state and input handling

use crate::models::tui::{PathPrompt, SystemLogEntry};
use crate::models::{AppEvent, FocusedPane, StepStatus, StreamKind};
use crate::pipeline::{Checkpoint, Decision, Orchestrator};
use crate::utils::ansi::strip_ansi;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::Level;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Oldest output lines are dropped past this
pub const MAX_OUTPUT_LINES: usize = 2000;
const MAX_SYSTEM_LOG: usize = 500;
const MAX_HISTORY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub kind: StreamKind,
    pub text: String,
}

/// Checkpoint popup with the highlighted option
#[derive(Debug, Clone)]
pub struct CheckpointDialog {
    pub checkpoint: Checkpoint,
    pub selected: usize,
}

impl CheckpointDialog {
    pub fn decision(&self) -> Decision {
        let options = self.checkpoint.options();
        options[self.selected.min(options.len() - 1)]
    }
}

pub struct App {
    pub orchestrator: Orchestrator,
    pub output: VecDeque<OutputLine>,
    /// Unterminated tail of the last output chunk
    partial: Option<OutputLine>,
    /// Lines scrolled back from the bottom; 0 follows new output
    pub scroll_back: usize,
    pub system_log: Vec<SystemLogEntry>,
    /// Every command line the runner started, oldest first
    pub history: VecDeque<String>,
    pub selected_step: usize,
    pub selected_file: usize,
    pub focused_pane: FocusedPane,
    pub checkpoint: Option<CheckpointDialog>,
    pub notice: Option<String>,
    pub prompt: Option<(PathPrompt, String)>,
    pub confirm_quit: bool,
    pub show_help: bool,
    pub should_quit: bool,
    /// Where `n` creates new projects
    pub project_parent: PathBuf,
}

impl App {
    pub fn new(orchestrator: Orchestrator, project_parent: PathBuf) -> Self {
        let mut app = Self {
            orchestrator,
            output: VecDeque::new(),
            partial: None,
            scroll_back: 0,
            system_log: Vec::new(),
            history: VecDeque::new(),
            selected_step: 0,
            selected_file: 0,
            focused_pane: FocusedPane::StepList,
            checkpoint: None,
            notice: None,
            prompt: None,
            confirm_quit: false,
            show_help: false,
            should_quit: false,
            project_parent,
        };
        app.select_next_step();
        app
    }

    // Runner / orchestrator events

    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ProcessOutput(kind, text) => self.add_output(kind, &text),
            AppEvent::ProcessFinished { .. } => {
                self.flush_partial();
                self.orchestrator.handle_event(&event);
            }
            AppEvent::ChainFinished(_) => {
                self.flush_partial();
                if let Some(checkpoint) = self.orchestrator.handle_event(&event) {
                    self.selected_step = checkpoint.index;
                    self.checkpoint = Some(CheckpointDialog {
                        checkpoint,
                        selected: 0,
                    });
                }
            }
            AppEvent::StepChanged(index, status) => {
                if status == StepStatus::Running {
                    self.selected_step = index;
                }
            }
            AppEvent::Error(message) => self.push_log(Level::Error, message),
            AppEvent::Warning(message) => {
                self.notice = Some(message.clone());
                self.push_log(Level::Warn, message);
            }
            AppEvent::Info(message) => self.push_log(Level::Info, message),
            AppEvent::Tick => {}
        }
    }

    /// Append a chunk of tool output. Chunks are not line aligned, so an
    /// unterminated tail is held back until the rest of the line arrives.
    pub fn add_output(&mut self, kind: StreamKind, chunk: &str) {
        let text = strip_ansi(chunk);
        if kind == StreamKind::Command {
            self.flush_partial();
            self.push_history(text.trim_start_matches("$ ").to_string());
            self.push_output(OutputLine { kind, text });
            return;
        }

        if self.partial.as_ref().is_some_and(|p| p.kind != kind) {
            self.flush_partial();
        }
        let mut buffered = self.partial.take().map(|p| p.text).unwrap_or_default();
        buffered.push_str(&text);

        let mut pieces: Vec<&str> = buffered.split('\n').collect();
        let tail = pieces.pop().unwrap_or_default();
        for piece in pieces {
            self.push_output(OutputLine {
                kind,
                text: piece.to_string(),
            });
        }
        if !tail.is_empty() {
            self.partial = Some(OutputLine {
                kind,
                text: tail.to_string(),
            });
        }
    }

    fn flush_partial(&mut self) {
        if let Some(line) = self.partial.take() {
            self.push_output(line);
        }
    }

    fn push_output(&mut self, line: OutputLine) {
        self.output.push_back(line);
        if self.scroll_back > 0 {
            self.scroll_back += 1;
        }
        while self.output.len() > MAX_OUTPUT_LINES {
            self.output.pop_front();
        }
        self.scroll_back = self.scroll_back.min(self.output.len());
    }

    /// Output lines including the unterminated tail
    pub fn output_lines(&self) -> impl Iterator<Item = &OutputLine> {
        self.output.iter().chain(self.partial.iter())
    }

    pub fn output_len(&self) -> usize {
        self.output.len() + usize::from(self.partial.is_some())
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
        self.partial = None;
        self.scroll_back = 0;
    }

    fn push_history(&mut self, command: String) {
        self.history.push_back(command);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    fn push_log(&mut self, level: Level, message: String) {
        self.system_log.push(SystemLogEntry::new(level, message));
        if self.system_log.len() > MAX_SYSTEM_LOG {
            self.system_log.remove(0);
        }
    }

    // Keyboard input

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return;
        }
        if self.notice.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.notice = None;
            }
            return;
        }
        if self.checkpoint.is_some() {
            self.handle_checkpoint_key(key);
            return;
        }
        if self.confirm_quit {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.orchestrator.stop().await;
                    self.should_quit = true;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.confirm_quit = false;
                }
                _ => {}
            }
            return;
        }
        if self.show_help {
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.request_quit()
            }
            KeyCode::Char('q') | KeyCode::Esc => self.request_quit(),
            KeyCode::Tab => self.focused_pane = self.focused_pane.next(),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp if self.focused_pane == FocusedPane::LogPane => self.scroll_output(-10),
            KeyCode::PageDown if self.focused_pane == FocusedPane::LogPane => self.scroll_output(10),
            KeyCode::Home if self.focused_pane == FocusedPane::LogPane => {
                self.scroll_back = self.output_len();
            }
            KeyCode::End if self.focused_pane == FocusedPane::LogPane => self.scroll_back = 0,
            KeyCode::Enter => {
                if self.orchestrator.is_executing() {
                    self.orchestrator.send_enter().await;
                } else {
                    self.run_selected_step();
                }
            }
            KeyCode::Char('s') => {
                if self.orchestrator.is_executing() {
                    self.orchestrator.stop().await;
                }
            }
            KeyCode::Char('c') => {
                let chip = self.orchestrator.session().chip.toggled();
                match self.orchestrator.set_chip(chip) {
                    Ok(()) => self.select_next_step(),
                    Err(e) => self.notice = Some(e.notice()),
                }
            }
            KeyCode::Char('m') => {
                let mode = self.orchestrator.session().mode.toggled();
                match self.orchestrator.set_mode(mode) {
                    Ok(()) => self.select_next_step(),
                    Err(e) => self.notice = Some(e.notice()),
                }
            }
            KeyCode::Char('i') => self.open_prompt(PathPrompt::Firmware),
            KeyCode::Char('b') => self.open_prompt(PathPrompt::Blob),
            KeyCode::Char('o') => self.open_prompt(PathPrompt::OpenProject),
            KeyCode::Char('n') => self.create_project(),
            KeyCode::Char('r') => {
                if !self.orchestrator.is_executing() {
                    self.orchestrator.reload_steps();
                    self.select_next_step();
                }
            }
            KeyCode::Char('l') => self.clear_output(),
            KeyCode::Char('h') | KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some((kind, buffer)) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                let kind = *kind;
                let input = buffer.trim().to_string();
                self.prompt = None;
                if !input.is_empty() {
                    self.submit_path(kind, &expand_home(&input));
                }
            }
            _ => {}
        }
    }

    fn handle_checkpoint_key(&mut self, key: KeyEvent) {
        let Some(dialog) = self.checkpoint.as_mut() else {
            return;
        };
        let count = dialog.checkpoint.options().len();
        let chosen = match key.code {
            KeyCode::Left | KeyCode::Up | KeyCode::BackTab => {
                dialog.selected = (dialog.selected + count - 1) % count;
                None
            }
            KeyCode::Right | KeyCode::Down | KeyCode::Tab => {
                dialog.selected = (dialog.selected + 1) % count;
                None
            }
            KeyCode::Enter => Some(dialog.decision()),
            KeyCode::Char('n') => Some(Decision::NextStep),
            KeyCode::Char('r') => Some(Decision::Retry),
            KeyCode::Char('c') | KeyCode::Esc => Some(Decision::Close),
            _ => None,
        };

        let Some(decision) = chosen else {
            return;
        };
        if !dialog.checkpoint.options().contains(&decision) {
            return;
        }
        let checkpoint = dialog.checkpoint.clone();
        self.checkpoint = None;
        if !self.orchestrator.apply_decision(&checkpoint, decision) {
            self.select_next_step();
        }
    }

    fn request_quit(&mut self) {
        if self.orchestrator.is_executing() {
            self.confirm_quit = true;
        } else {
            self.should_quit = true;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.focused_pane {
            FocusedPane::StepList => {
                self.selected_step =
                    step_index(self.selected_step, delta, self.orchestrator.steps().len());
            }
            FocusedPane::FileList => {
                self.selected_file = step_index(
                    self.selected_file,
                    delta,
                    self.orchestrator.session().files.len(),
                );
            }
            FocusedPane::LogPane => self.scroll_output(delta),
        }
    }

    /// Negative deltas scroll towards older output
    fn scroll_output(&mut self, delta: isize) {
        self.scroll_back = self
            .scroll_back
            .saturating_add_signed(-delta)
            .min(self.output_len());
    }

    fn run_selected_step(&mut self) {
        if !self.orchestrator.session().steps_enabled() {
            self.notice = Some(self.missing_inputs_notice());
            return;
        }
        self.orchestrator.execute_step(self.selected_step);
    }

    fn missing_inputs_notice(&self) -> String {
        let session = self.orchestrator.session();
        if session.project.is_none() {
            "Please open or create a project first".to_string()
        } else if session.mode.needs_blob() {
            "Select an IPSW and a blob with a generator first".to_string()
        } else {
            "Select an IPSW first".to_string()
        }
    }

    fn open_prompt(&mut self, kind: PathPrompt) {
        if kind != PathPrompt::OpenProject && self.orchestrator.session().project.is_none() {
            self.notice = Some("Please open or create a project first".to_string());
            return;
        }
        self.prompt = Some((kind, String::new()));
    }

    /// Act on a path typed into the prompt
    pub fn submit_path(&mut self, kind: PathPrompt, path: &Path) {
        let result = match kind {
            PathPrompt::Firmware if !path.is_file() => {
                Err(format!("File does not exist: {}", path.display()))
            }
            PathPrompt::Blob if !path.is_file() => {
                Err(format!("File does not exist: {}", path.display()))
            }
            PathPrompt::Firmware => self
                .orchestrator
                .select_firmware(path)
                .map_err(|e| e.notice()),
            PathPrompt::Blob => self
                .orchestrator
                .select_blob(path)
                .map(|_| ())
                .map_err(|e| e.notice()),
            PathPrompt::OpenProject => self.open_project(path),
        };
        if let Err(message) = result {
            self.notice = Some(message);
        }
    }

    fn open_project(&mut self, dir: &Path) -> Result<(), String> {
        if !dir.is_dir() {
            return Err(format!("Not a directory: {}", dir.display()));
        }
        self.orchestrator.open_project(dir).map_err(|e| e.notice())?;
        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.project_parent = parent.to_path_buf();
        }
        self.selected_file = 0;
        self.select_next_step();
        Ok(())
    }

    fn create_project(&mut self) {
        let parent = self.project_parent.clone();
        match self.orchestrator.create_project(&parent, None) {
            Ok(root) => {
                log::debug!("Created project at {}", root.display());
                self.selected_file = 0;
                self.select_next_step();
            }
            Err(e) => {
                self.notice = Some(format!("Cannot create project: {}", e.notice()));
            }
        }
    }

    /// Point the step cursor at the next pending step
    pub fn select_next_step(&mut self) {
        let session = self.orchestrator.session();
        let last = session.steps.len().saturating_sub(1);
        self.selected_step = session.next_step().unwrap_or(0).min(last);
    }

    /// Summary shown in the status panel header
    pub fn status_line(&self) -> String {
        let session = self.orchestrator.session();
        let mut status = session.pipeline_label();
        if self.orchestrator.is_executing() {
            if let Some(step) = session.steps.current().and_then(|i| session.steps.get(i)) {
                status.push_str(&format!(" | Running: {}", step.name));
            }
        } else if !session.steps_enabled() {
            status.push_str(" | Steps disabled");
        }
        status
    }
}

fn step_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    current.saturating_add_signed(delta).min(len - 1)
}

/// `~/x` → `<home>/x`
fn expand_home(input: &str) -> PathBuf {
    match input.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(input)),
        None => PathBuf::from(input),
    }
}
