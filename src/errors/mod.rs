//! Error handling for m3rula

pub mod types;

pub use types::*;
