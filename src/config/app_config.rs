//! Application configuration management

use crate::errors::{M3rulaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const RAIN_BINARY: &str = "turdusra1n";
pub const MERULA_BINARY: &str = "turdus_merula";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default project directory opened by the TUI
    pub default_project_dir: Option<PathBuf>,
    /// External tool locations
    pub tools: ToolConfig,
    /// Process runner tuning
    pub runner: RunnerConfig,
}

/// External tool locations. Unset paths are looked up next to the
/// executable, then on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub rain: Option<PathBuf>,
    pub merula: Option<PathBuf>,
}

/// Process runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shell used to interpret command lines
    pub shell: String,
    /// Pause between chained commands so the device can settle
    pub settle_delay_ms: u64,
    /// How long `stop` waits for a killed process
    pub stop_timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            settle_delay_ms: 100,
            stop_timeout_ms: 3000,
        }
    }
}

impl RunnerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Resolved tool paths, ready to be placed on a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub rain: PathBuf,
    pub merula: PathBuf,
}

impl ToolPaths {
    pub fn new(rain: impl Into<PathBuf>, merula: impl Into<PathBuf>) -> Self {
        Self {
            rain: rain.into(),
            merula: merula.into(),
        }
    }
}

impl AppConfig {
    /// Default location: `<config dir>/m3rula/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("m3rula").join("config.toml"))
    }

    /// Load from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            M3rulaError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Load from `path` if given, else from the default location when present,
    /// else return defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::debug!("Loading configuration from {}", path.display());
                Self::load_from(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn resolve_tools(&self) -> ToolPaths {
        ToolPaths {
            rain: self
                .tools
                .rain
                .clone()
                .unwrap_or_else(|| locate_tool(RAIN_BINARY)),
            merula: self
                .tools
                .merula
                .clone()
                .unwrap_or_else(|| locate_tool(MERULA_BINARY)),
        }
    }
}

/// Tools normally ship alongside the front-end binary
fn locate_tool(name: &str) -> PathBuf {
    let bundled = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(name)));
    if let Some(path) = bundled.filter(|p| p.is_file()) {
        return path;
    }
    match which::which(name) {
        Ok(path) => path,
        Err(_) => {
            log::warn!("{} not found next to executable or on PATH", name);
            PathBuf::from(name)
        }
    }
}
