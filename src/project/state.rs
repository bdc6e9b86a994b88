//! Project state persisted as `project.json` in the project directory

use crate::errors::{M3rulaError, Result};
use crate::models::{ChipVariant, ProjectRecord, RestoreMode};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

pub const PROJECT_FILE: &str = "project.json";

/// State of the active project. Only obtainable through [`ProjectState::open`],
/// so the root directory is always known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectState {
    root: PathBuf,
    record: ProjectRecord,
}

impl ProjectState {
    /// Open a project directory. A missing `project.json` is created with
    /// defaults; the returned flag is true in that case.
    pub fn open(root: impl Into<PathBuf>) -> Result<(Self, bool)> {
        let root = root.into();
        if !root.is_dir() {
            return Err(M3rulaError::Project(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let state_file = root.join(PROJECT_FILE);
        if state_file.exists() {
            let content = fs::read_to_string(&state_file)?;
            let record: ProjectRecord = serde_json::from_str(&content)?;
            log::debug!("Loaded {} from {}", PROJECT_FILE, root.display());
            Ok((Self { root, record }, false))
        } else {
            let state = Self {
                root,
                record: ProjectRecord::default(),
            };
            state.save()?;
            log::info!("Initialized new project at {}", state.root.display());
            Ok((state, true))
        }
    }

    /// Rewrite `project.json` wholesale. Writes a sibling temp file first and
    /// renames it over the original.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.record)?;
        let target = self.root.join(PROJECT_FILE);
        let staging = self.root.join(format!(".{}.tmp", PROJECT_FILE));
        fs::write(&staging, json)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn chip(&self) -> ChipVariant {
        self.record.chip
    }

    pub fn firmware(&self) -> Option<PathBuf> {
        non_empty(&self.record.ipsw).map(PathBuf::from)
    }

    pub fn blob(&self) -> Option<PathBuf> {
        non_empty(&self.record.blob).map(PathBuf::from)
    }

    pub fn generator(&self) -> Option<&str> {
        non_empty(&self.record.r#gen)
    }

    pub fn set_chip(&mut self, chip: ChipVariant) -> Result<()> {
        self.record.chip = chip;
        self.save()
    }

    pub fn set_firmware(&mut self, path: &Path) -> Result<()> {
        self.record.ipsw = Some(path.to_string_lossy().into_owned());
        self.save()
    }

    pub fn set_blob(&mut self, path: &Path, generator: String) -> Result<()> {
        self.record.blob = Some(path.to_string_lossy().into_owned());
        self.record.r#gen = Some(generator);
        self.save()
    }

    /// Path of a file directly inside the project directory
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

/// Default name offered for a new project: `A9_Tethered_20250101_120000`
pub fn default_project_name(chip: ChipVariant, mode: RestoreMode, now: DateTime<Local>) -> String {
    format!("{}_{}_{}", chip, mode, now.format("%Y%m%d_%H%M%S"))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
