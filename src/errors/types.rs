//! Custom error types for m3rula

use std::fmt;

/// Main error type for m3rula operations
#[derive(Debug)]
pub enum M3rulaError {
    /// Configuration related errors
    Config(String),
    /// Project directory / project.json errors
    Project(String),
    /// A step's required input is missing; nothing was run
    Precondition(String),
    /// External process could not be started or controlled
    Process(String),
    /// The external tool exited cleanly but left no usable artifact
    Artifact(String),
    /// General I/O errors
    Io(std::io::Error),
    /// Serialization errors
    Serialization(String),
}

impl M3rulaError {
    /// Short message used for the operator notice, without the category prefix
    pub fn notice(&self) -> String {
        match self {
            M3rulaError::Config(msg)
            | M3rulaError::Project(msg)
            | M3rulaError::Precondition(msg)
            | M3rulaError::Process(msg)
            | M3rulaError::Artifact(msg)
            | M3rulaError::Serialization(msg) => msg.clone(),
            M3rulaError::Io(err) => err.to_string(),
        }
    }
}

impl fmt::Display for M3rulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            M3rulaError::Config(msg) => write!(f, "Configuration error: {}", msg),
            M3rulaError::Project(msg) => write!(f, "Project error: {}", msg),
            M3rulaError::Precondition(msg) => write!(f, "Missing: {}", msg),
            M3rulaError::Process(msg) => write!(f, "Process error: {}", msg),
            M3rulaError::Artifact(msg) => write!(f, "Artifact error: {}", msg),
            M3rulaError::Io(err) => write!(f, "I/O error: {}", err),
            M3rulaError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for M3rulaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            M3rulaError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for M3rulaError {
    fn from(err: std::io::Error) -> Self {
        M3rulaError::Io(err)
    }
}

impl From<serde_json::Error> for M3rulaError {
    fn from(err: serde_json::Error) -> Self {
        M3rulaError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for M3rulaError {
    fn from(err: toml::de::Error) -> Self {
        M3rulaError::Config(err.to_string())
    }
}

impl From<glob::PatternError> for M3rulaError {
    fn from(err: glob::PatternError) -> Self {
        M3rulaError::Project(format!("invalid file pattern: {}", err))
    }
}

/// Result type alias for m3rula operations
pub type Result<T> = std::result::Result<T, M3rulaError>;
