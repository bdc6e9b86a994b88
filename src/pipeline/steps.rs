//! Step definition table
//!
//! The whole workflow in one place: `(chip, mode)` selects a fixed, ordered
//! pipeline of step descriptors.

use crate::models::{ChipVariant, RestoreMode, Step, StepDescriptor, StepKind};
use crate::pipeline::artifacts::{PTEBLOCK, SHCBLOCK_POST, SHCBLOCK_PRE, SHCBLOCK_UNTETH};
use crate::project::RESTORE_DONE;

const A9_TETHERED: [StepDescriptor; 5] = [
    StepDescriptor {
        name: "Get SHC (pre)",
        kind: StepKind::A9TetheredGetShcPre,
    },
    StepDescriptor {
        name: "Restore Device",
        kind: StepKind::A9TetheredRestore,
    },
    StepDescriptor {
        name: "Get SHC (post)",
        kind: StepKind::A9TetheredGetShcPost,
    },
    StepDescriptor {
        name: "Get pteblock",
        kind: StepKind::A9TetheredGetPteblock,
    },
    StepDescriptor {
        name: "Boot Device",
        kind: StepKind::A9TetheredBoot,
    },
];

const A10_TETHERED: [StepDescriptor; 2] = [
    StepDescriptor {
        name: "Restore Device",
        kind: StepKind::A10TetheredRestore,
    },
    StepDescriptor {
        name: "Boot Device",
        kind: StepKind::A10TetheredBoot,
    },
];

const A9_UNTETHERED: [StepDescriptor; 2] = [
    StepDescriptor {
        name: "Get SHC Block",
        kind: StepKind::A9UntetheredGetShc,
    },
    StepDescriptor {
        name: "Untethered Restore",
        kind: StepKind::A9UntetheredRestore,
    },
];

const A10_UNTETHERED: [StepDescriptor; 1] = [StepDescriptor {
    name: "Untethered Restore",
    kind: StepKind::A10UntetheredRestore,
}];

/// Ordered step descriptors for a pipeline
pub fn step_table(chip: ChipVariant, mode: RestoreMode) -> &'static [StepDescriptor] {
    match (chip, mode) {
        (ChipVariant::A9, RestoreMode::Tethered) => &A9_TETHERED,
        (ChipVariant::A10, RestoreMode::Tethered) => &A10_TETHERED,
        (ChipVariant::A9, RestoreMode::Untethered) => &A9_UNTETHERED,
        (ChipVariant::A10, RestoreMode::Untethered) => &A10_UNTETHERED,
    }
}

/// Fresh step list, all pending
pub fn build_steps(chip: ChipVariant, mode: RestoreMode) -> Vec<Step> {
    step_table(chip, mode)
        .iter()
        .enumerate()
        .map(|(index, descriptor)| Step::new(index + 1, *descriptor))
        .collect()
}

/// File whose presence in the project directory means the step already
/// succeeded. Boot steps leave nothing behind.
pub fn completion_marker(kind: StepKind) -> Option<&'static str> {
    match kind {
        StepKind::A9TetheredGetShcPre => Some(SHCBLOCK_PRE),
        StepKind::A9TetheredRestore => Some(RESTORE_DONE),
        StepKind::A9TetheredGetShcPost => Some(SHCBLOCK_POST),
        StepKind::A9TetheredGetPteblock => Some(PTEBLOCK),
        StepKind::A9TetheredBoot => None,
        StepKind::A10TetheredRestore => Some(RESTORE_DONE),
        StepKind::A10TetheredBoot => None,
        StepKind::A9UntetheredGetShc => Some(SHCBLOCK_UNTETH),
        StepKind::A9UntetheredRestore => Some(RESTORE_DONE),
        StepKind::A10UntetheredRestore => Some(RESTORE_DONE),
    }
}
