//! Project directory listing and glob helpers

use crate::errors::Result;
use glob::{Pattern, glob};
use std::path::{Path, PathBuf};

pub const RESTORE_DONE: &str = "restore_done";

/// Category shown in the files view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `*.bin` blocks produced by the tools
    Block,
    /// `*.img4` / `*.im4p` firmware images
    Image,
    /// Completion markers
    Marker,
}

impl FileKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            FileKind::Block => "📄",
            FileKind::Image => "🔐",
            FileKind::Marker => "✓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    pub name: String,
    pub kind: FileKind,
}

/// Files in `dir` matching a simple file-name pattern such as `*signed-SEP.img4`,
/// sorted by path.
pub fn glob_in(dir: &Path, file_pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}",
        Pattern::escape(&dir.to_string_lossy()),
        file_pattern
    );
    let mut matches: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();
    Ok(matches)
}

/// First match of `file_pattern` in `dir`, if any
pub fn first_match(dir: &Path, file_pattern: &str) -> Result<Option<PathBuf>> {
    Ok(glob_in(dir, file_pattern)?.into_iter().next())
}

/// Everything the files view shows, in display order
pub fn list_project_files(root: &Path) -> Result<Vec<ProjectFile>> {
    let mut files = Vec::new();
    for (pattern, kind) in [
        ("*.bin", FileKind::Block),
        ("*.img4", FileKind::Image),
        ("*.im4p", FileKind::Image),
    ] {
        for path in glob_in(root, pattern)? {
            if let Some(name) = path.file_name() {
                files.push(ProjectFile {
                    name: name.to_string_lossy().into_owned(),
                    kind,
                });
            }
        }
    }
    if root.join(RESTORE_DONE).exists() {
        files.push(ProjectFile {
            name: RESTORE_DONE.to_string(),
            kind: FileKind::Marker,
        });
    }
    Ok(files)
}
