//! Pipeline step models

use ratatui::style::Color;

/// Status of one step in the active pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl StepStatus {
    pub fn color(&self) -> Color {
        match self {
            StepStatus::Pending => Color::Gray,
            StepStatus::Running => Color::Yellow,
            StepStatus::Success => Color::Green,
            StepStatus::Failed => Color::Red,
        }
    }

    /// Icon shown next to the step; `is_next` only affects pending steps
    pub fn symbol(&self, is_next: bool) -> &'static str {
        match self {
            StepStatus::Pending if is_next => "→",
            StepStatus::Pending => "○",
            StepStatus::Running => "⏸",
            StepStatus::Success => "✓",
            StepStatus::Failed => "✗",
        }
    }
}

/// Which behavior a step runs. One variant per (chip, mode, position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    A9TetheredGetShcPre,
    A9TetheredRestore,
    A9TetheredGetShcPost,
    A9TetheredGetPteblock,
    A9TetheredBoot,
    A10TetheredRestore,
    A10TetheredBoot,
    A9UntetheredGetShc,
    A9UntetheredRestore,
    A10UntetheredRestore,
}

/// Immutable table entry describing a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDescriptor {
    pub name: &'static str,
    pub kind: StepKind,
}

/// A step in the active list. Status is the only field that changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// 1-based position in the pipeline
    pub ordinal: usize,
    pub name: &'static str,
    pub kind: StepKind,
    pub status: StepStatus,
}

impl Step {
    pub fn new(ordinal: usize, descriptor: StepDescriptor) -> Self {
        Self {
            ordinal,
            name: descriptor.name,
            kind: descriptor.kind,
            status: StepStatus::Pending,
        }
    }

    pub fn label(&self) -> String {
        format!("{}. {}", self.ordinal, self.name)
    }
}
