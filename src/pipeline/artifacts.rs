//! Artifact resolution and working directory handling
//!
//! The external tools do not name their output consistently between runs,
//! so after a step the newest unclaimed `*.bin` is renamed to the canonical
//! name the next step expects. This is best effort: an unrelated `.bin`
//! dropped into the project directory can be picked up, which the exclusion
//! list only partly guards against.

use crate::errors::{M3rulaError, Result};
use crate::project::glob_in;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

pub const SHCBLOCK_PRE: &str = "shcblock_pre.bin";
pub const SHCBLOCK_POST: &str = "shcblock_post.bin";
pub const PTEBLOCK: &str = "pteblock.bin";
pub const SHCBLOCK_UNTETH: &str = "shcblock_unteth.bin";

/// Subdirectories the tools write into; flattened after every chain
pub const WORKING_DIRS: [&str; 2] = ["block", "image4"];

const ARTIFACT_PATTERN: &str = "*.bin";

/// How a canonical artifact came to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Target was already there; nothing touched
    AlreadyPresent,
    /// Renamed from the newest candidate
    Renamed { from: String },
}

/// Make sure `root/<target>` exists, renaming the newest `*.bin` that is not
/// in `exclude` if necessary.
pub fn resolve_artifact(root: &Path, target: &str, exclude: &[&str]) -> Result<Resolution> {
    let target_path = root.join(target);
    if target_path.exists() {
        return Ok(Resolution::AlreadyPresent);
    }

    let mut newest: Option<(SystemTime, std::path::PathBuf)> = None;
    for candidate in glob_in(root, ARTIFACT_PATTERN)? {
        let excluded = candidate
            .file_name()
            .map(|name| exclude.iter().any(|ex| name == *ex))
            .unwrap_or(true);
        if excluded {
            continue;
        }
        let modified = fs::metadata(&candidate)?.modified()?;
        if newest.as_ref().is_none_or(|(best, _)| modified >= *best) {
            newest = Some((modified, candidate));
        }
    }

    let Some((_, source)) = newest else {
        return Err(M3rulaError::Artifact(format!(
            "no artifact produced for {}",
            target
        )));
    };

    fs::rename(&source, &target_path)?;
    let from = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    log::info!("Renamed {} to {}", from, target);
    Ok(Resolution::Renamed { from })
}

/// Create the working subdirectories before a step runs
pub fn prepare_working_dirs(root: &Path) -> Result<()> {
    for dir in WORKING_DIRS {
        fs::create_dir_all(root.join(dir))?;
    }
    Ok(())
}

/// Move every visible file out of the working subdirectories into `root`,
/// then delete the subdirectories. Returns `dir/name` for each moved file.
pub fn flatten_working_dirs(root: &Path) -> Result<Vec<String>> {
    let mut moved = Vec::new();
    for dir in WORKING_DIRS {
        let working = root.join(dir);
        if !working.is_dir() {
            continue;
        }

        let mut entries: Vec<_> = fs::read_dir(&working)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        for path in entries {
            let Some(name) = path.file_name() else {
                continue;
            };
            if !path.is_file() || name.to_string_lossy().starts_with('.') {
                continue;
            }
            fs::rename(&path, root.join(name))?;
            moved.push(format!("{}/{}", dir, name.to_string_lossy()));
        }

        if let Err(e) = fs::remove_dir_all(&working) {
            log::warn!("Failed to remove {}: {}", working.display(), e);
        }
    }
    Ok(moved)
}
