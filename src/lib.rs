//! m3rula - terminal front-end for turdusra1n / turdus_merula
//!
//! Walks an operator through the device and firmware dependent sequence of
//! tool invocations needed to restore or downgrade A9/A10 iOS devices. The
//! project directory records progress, so a pipeline can be resumed at any
//! time.

pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod project;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use errors::*;
pub use models::*;
pub use pipeline::{Checkpoint, Decision, Orchestrator};

/// m3rula version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
