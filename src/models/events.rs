//! Application events for TUI and CLI operations

use crate::models::step::StepStatus;

/// Which stream a chunk of process output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Echo of the command line about to run
    Command,
    Stdout,
    Stderr,
}

/// Application events for communication between components
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // Process runner events
    ProcessOutput(StreamKind, String),
    ProcessFinished { success: bool, exit_code: i32 },
    ChainFinished(bool),

    // Step manager events
    StepChanged(usize, StepStatus), // index, new status

    // General events
    Tick,

    // Operator-facing system log
    Error(String),
    Warning(String),
    Info(String),
}
