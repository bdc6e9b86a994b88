//! Project directory management
//!
//! A project is a flat directory holding `project.json`, the artifacts the
//! external tools produce, and completion markers. The directory is the
//! single source of truth for pipeline progress.

pub mod files;
pub mod generator;
pub mod state;

pub use files::{FileKind, ProjectFile, RESTORE_DONE, first_match, glob_in, list_project_files};
pub use generator::{UNKNOWN_GENERATOR, extract_generator};
pub use state::{PROJECT_FILE, ProjectState, default_project_name};
