//! Restore pipeline: step table, status bookkeeping, behaviors, artifact
//! handling and the orchestrator tying them together.

pub mod artifacts;
pub mod behaviors;
pub mod manager;
pub mod orchestrator;
pub mod progress;
pub mod steps;

pub use artifacts::{PTEBLOCK, SHCBLOCK_POST, SHCBLOCK_PRE, SHCBLOCK_UNTETH, WORKING_DIRS};
pub use behaviors::{Completion, StepPlan};
pub use manager::StepManager;
pub use orchestrator::{Checkpoint, Decision, Orchestrator, Session};
pub use steps::{build_steps, step_table};
