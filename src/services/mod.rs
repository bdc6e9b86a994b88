//! Services shared by the TUI and CLI front-ends

pub mod process_runner;

pub use process_runner::{KILLED_EXIT_CODE, ProcessRunner};
