//! Data models and types used throughout m3rula

pub mod events;
pub mod project;
pub mod step;
pub mod tui;

// Re-export commonly used types
pub use events::*;
pub use project::*;
pub use step::*;

// Only export TUI-specific types that don't conflict
pub use tui::FocusedPane;
