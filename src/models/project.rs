//! Project-related data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device processor generation; selects which pipeline applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ChipVariant {
    #[default]
    A9,
    A10,
}

impl ChipVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ChipVariant::A9 => "A9",
            ChipVariant::A10 => "A10",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ChipVariant::A9 => ChipVariant::A10,
            ChipVariant::A10 => ChipVariant::A9,
        }
    }
}

impl fmt::Display for ChipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Restore mode. Session-only: project.json does not record it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum RestoreMode {
    /// Boot helper must run on every power cycle
    #[default]
    Tethered,
    /// Signed restore with a saved blob; no boot helper afterwards
    Untethered,
}

impl RestoreMode {
    pub fn name(&self) -> &'static str {
        match self {
            RestoreMode::Tethered => "Tethered",
            RestoreMode::Untethered => "Untethered",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            RestoreMode::Tethered => RestoreMode::Untethered,
            RestoreMode::Untethered => RestoreMode::Tethered,
        }
    }

    /// Untethered restores need the signing blob and its generator
    pub fn needs_blob(&self) -> bool {
        matches!(self, RestoreMode::Untethered)
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// On-disk record stored as `project.json`.
///
/// Field order and names are part of the file format shared with existing
/// project directories.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(default)]
    pub ipsw: Option<String>,
    #[serde(default)]
    pub blob: Option<String>,
    #[serde(default)]
    pub r#gen: Option<String>,
    #[serde(default)]
    pub chip: ChipVariant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_serializes_as_plain_name() {
        assert_eq!(serde_json::to_string(&ChipVariant::A10).unwrap(), "\"A10\"");
        let chip: ChipVariant = serde_json::from_str("\"A9\"").unwrap();
        assert_eq!(chip, ChipVariant::A9);
    }

    #[test]
    fn test_record_missing_chip_defaults_to_a9() {
        let record: ProjectRecord =
            serde_json::from_str(r#"{"ipsw": "/tmp/x.ipsw", "blob": null, "gen": null}"#).unwrap();
        assert_eq!(record.chip, ChipVariant::A9);
        assert_eq!(record.ipsw.as_deref(), Some("/tmp/x.ipsw"));
    }

    #[test]
    fn test_generator_keeps_gen_key() {
        let record = ProjectRecord {
            r#gen: Some("0x1111222233334444".to_string()),
            ..ProjectRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["gen"], "0x1111222233334444");
        assert!(json.get("r#gen").is_none());

        let back: ProjectRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_mode_needs_blob() {
        assert!(!RestoreMode::Tethered.needs_blob());
        assert!(RestoreMode::Untethered.needs_blob());
        assert_eq!(RestoreMode::Tethered.toggled(), RestoreMode::Untethered);
    }
}
