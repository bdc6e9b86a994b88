//! Utility functions and helpers used throughout m3rula

pub mod ansi;
pub mod logging;
