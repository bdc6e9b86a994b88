//! Step status bookkeeping for the active pipeline
//!
//! Passive: the orchestrator decides when a step may start.

use crate::models::{AppEvent, Step, StepStatus};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct StepManager {
    steps: Vec<Step>,
    current: Option<usize>,
    tx: Option<mpsc::UnboundedSender<AppEvent>>,
}

impl StepManager {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            steps: Vec::new(),
            current: None,
            tx: Some(tx),
        }
    }

    /// Replace the active list; every step starts pending and none is current
    pub fn set_steps(&mut self, steps: Vec<Step>) {
        self.steps = steps;
        self.current = None;
        for step in &mut self.steps {
            step.status = StepStatus::Pending;
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.steps.len()
    }

    pub fn start_step(&mut self, index: usize) {
        if index < self.steps.len() {
            self.current = Some(index);
            self.set_status(index, StepStatus::Running);
        }
    }

    pub fn complete_step(&mut self, index: usize, success: bool) {
        if index < self.steps.len() {
            let status = if success {
                StepStatus::Success
            } else {
                StepStatus::Failed
            };
            self.set_status(index, status);
        }
    }

    /// Used by progress detection; does not touch the current index
    pub fn mark(&mut self, index: usize, status: StepStatus) {
        if index < self.steps.len() {
            self.set_status(index, status);
        }
    }

    /// First pending step, shown as "next"
    pub fn next_pending(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.status == StepStatus::Pending)
    }

    /// (succeeded, total)
    pub fn progress(&self) -> (usize, usize) {
        let done = self
            .steps
            .iter()
            .filter(|step| step.status == StepStatus::Success)
            .count();
        (done, self.steps.len())
    }

    pub fn progress_percent(&self) -> u16 {
        match self.progress() {
            (_, 0) => 0,
            (done, total) => ((done * 100) / total) as u16,
        }
    }

    fn set_status(&mut self, index: usize, status: StepStatus) {
        self.steps[index].status = status;
        if let Some(tx) = &self.tx {
            let _ = tx.send(AppEvent::StepChanged(index, status));
        }
    }
}
