//! Pipeline table, artifact and project store tests

use m3rula::models::{ChipVariant, RestoreMode, StepKind, StepStatus};
use m3rula::pipeline::artifacts::{Resolution, flatten_working_dirs, resolve_artifact};
use m3rula::pipeline::{SHCBLOCK_POST, SHCBLOCK_PRE, StepManager, build_steps, step_table};
use m3rula::project::{ProjectState, list_project_files};
use std::fs;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[test]
fn test_step_tables() {
    let names = |chip, mode| -> Vec<&'static str> {
        step_table(chip, mode).iter().map(|d| d.name).collect()
    };

    assert_eq!(
        names(ChipVariant::A9, RestoreMode::Tethered),
        vec![
            "Get SHC (pre)",
            "Restore Device",
            "Get SHC (post)",
            "Get pteblock",
            "Boot Device"
        ]
    );
    assert_eq!(
        names(ChipVariant::A10, RestoreMode::Tethered),
        vec!["Restore Device", "Boot Device"]
    );
    assert_eq!(
        names(ChipVariant::A9, RestoreMode::Untethered),
        vec!["Get SHC Block", "Untethered Restore"]
    );
    assert_eq!(
        names(ChipVariant::A10, RestoreMode::Untethered),
        vec!["Untethered Restore"]
    );
}

#[test]
fn test_built_steps_are_fresh() {
    let steps = build_steps(ChipVariant::A9, RestoreMode::Untethered);
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].ordinal, 1);
    assert_eq!(steps[1].kind, StepKind::A9UntetheredRestore);
    assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn test_step_manager_events() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = StepManager::new(tx);
    manager.set_steps(build_steps(ChipVariant::A10, RestoreMode::Tethered));

    manager.start_step(0);
    manager.complete_step(0, true);
    manager.start_step(7);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), 2);
    assert_eq!(manager.progress(), (1, 2));
    assert_eq!(manager.progress_percent(), 50);
    assert_eq!(manager.next_pending(), Some(1));
    assert_eq!(manager.current(), Some(0));
}

#[test]
fn test_resolver_leaves_existing_target_alone() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root = temp_dir.path();
    fs::write(root.join(SHCBLOCK_POST), b"canonical").unwrap();
    fs::write(root.join("stray.bin"), b"stray").unwrap();

    let resolution = resolve_artifact(root, SHCBLOCK_POST, &[SHCBLOCK_PRE]).unwrap();
    assert_eq!(resolution, Resolution::AlreadyPresent);
    assert!(root.join("stray.bin").exists());
    assert_eq!(fs::read(root.join(SHCBLOCK_POST)).unwrap(), b"canonical");
}

#[test]
fn test_resolver_skips_excluded_names() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root = temp_dir.path();
    fs::write(root.join(SHCBLOCK_PRE), b"pre").unwrap();

    let err = resolve_artifact(root, SHCBLOCK_POST, &[SHCBLOCK_PRE, SHCBLOCK_POST]).unwrap_err();
    assert!(err.to_string().contains("no artifact produced"));
    assert!(root.join(SHCBLOCK_PRE).exists());
}

#[test]
fn test_flatten_moves_visible_files_only() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root = temp_dir.path();
    fs::create_dir_all(root.join("block")).unwrap();
    fs::create_dir_all(root.join("image4")).unwrap();
    fs::write(root.join("block/a.bin"), b"a").unwrap();
    fs::write(root.join("block/.DS_Store"), b"").unwrap();
    fs::write(root.join("image4/iBoot.img4"), b"i").unwrap();
    fs::write(root.join("image4/signed-SEP.img4"), b"s").unwrap();

    let moved = flatten_working_dirs(root).unwrap();
    assert_eq!(
        moved,
        vec!["block/a.bin", "image4/iBoot.img4", "image4/signed-SEP.img4"]
    );
    assert!(root.join("a.bin").exists());
    assert!(!root.join(".DS_Store").exists());
    assert!(!root.join("block").exists());
    assert!(!root.join("image4").exists());

    let listed: Vec<String> = list_project_files(root)
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(listed, vec!["a.bin", "iBoot.img4", "signed-SEP.img4"]);
}

#[test]
fn test_project_record_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (mut state, created) = ProjectState::open(temp_dir.path()).unwrap();
    assert!(created);

    state.set_chip(ChipVariant::A10).unwrap();
    state
        .set_firmware(std::path::Path::new("/fw/iPhone9,1_14.3_Restore.ipsw"))
        .unwrap();

    let (reloaded, created) = ProjectState::open(temp_dir.path()).unwrap();
    assert!(!created);
    assert_eq!(reloaded, state);
    assert!(reloaded.blob().is_none());
    assert!(reloaded.generator().is_none());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp_dir.path().join("project.json")).unwrap())
            .unwrap();
    assert_eq!(json["chip"], "A10");
    assert_eq!(json["blob"], serde_json::Value::Null);
}
