//! Progress detection from the project directory
//!
//! Status is re-derived from marker files only, so a project resumes
//! correctly after a restart no matter what happened in memory before.

use crate::models::StepStatus;
use crate::pipeline::manager::StepManager;
use crate::pipeline::steps::completion_marker;
use std::path::Path;

/// Mark every step whose marker exists as succeeded. Returns the index of
/// the next step to run, if any.
pub fn detect_progress(manager: &mut StepManager, root: &Path) -> Option<usize> {
    let completed: Vec<usize> = manager
        .steps()
        .iter()
        .enumerate()
        .filter(|(_, step)| {
            completion_marker(step.kind).is_some_and(|marker| root.join(marker).exists())
        })
        .map(|(index, _)| index)
        .collect();

    for index in completed {
        manager.mark(index, StepStatus::Success);
    }

    let next = manager.next_pending();
    log::debug!(
        "Detected progress in {}: {:?}, next step {:?}",
        root.display(),
        manager.progress(),
        next.map(|i| i + 1)
    );
    next
}
