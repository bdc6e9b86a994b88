//! TUI-specific data models

use chrono::{DateTime, Local};

/// Which pane is currently focused in the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    StepList,
    FileList,
    LogPane,
}

impl FocusedPane {
    pub fn next(&self) -> Self {
        match self {
            FocusedPane::StepList => FocusedPane::FileList,
            FocusedPane::FileList => FocusedPane::LogPane,
            FocusedPane::LogPane => FocusedPane::StepList,
        }
    }
}

/// What the single-line prompt is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPrompt {
    Firmware,
    Blob,
    OpenProject,
}

impl PathPrompt {
    pub fn title(&self) -> &'static str {
        match self {
            PathPrompt::Firmware => "IPSW path",
            PathPrompt::Blob => "SHSH blob path",
            PathPrompt::OpenProject => "Project directory",
        }
    }
}

/// Entry in the timestamped system log
#[derive(Debug, Clone)]
pub struct SystemLogEntry {
    pub timestamp: DateTime<Local>,
    pub level: log::Level,
    pub message: String,
}

impl SystemLogEntry {
    pub fn new(level: log::Level, message: String) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message,
        }
    }

    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}
