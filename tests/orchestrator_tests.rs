//! Orchestrator tests
//!
//! End-to-end step execution against fake tool scripts: chain construction,
//! working directory flattening, artifact naming, checkpoints, retries and
//! resuming from the project directory.

#![cfg(unix)]


use m3rula::models::{AppEvent, ChipVariant, RestoreMode, StepStatus, StreamKind};
use m3rula::pipeline::Decision;
use m3rula::project::{ProjectState, UNKNOWN_GENERATOR};
use m3rula::services::KILLED_EXIT_CODE;
use std::fs;
use std::time::Duration;
use test_fixtures::{
    CRASHING_MERULA, SILENT_RAIN, SLOW_RAIN, TEST_GENERATOR, TestEnvironment, drain, errors,
    infos, next_checkpoint, warnings,
};

#[tokio::test]
async fn test_a9_tethered_first_two_steps() {
    let env = TestEnvironment::new();
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();

    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();
    assert!(orchestrator.session().steps_enabled());
    assert_eq!(orchestrator.session().next_step(), Some(0));

    // Step 1: SHC block lands in block/ and gets its canonical name
    assert!(orchestrator.execute_step(0));
    assert_eq!(orchestrator.steps()[0].status, StepStatus::Running);
    let (checkpoint, events) = next_checkpoint(&mut orchestrator, &mut rx).await;

    assert!(checkpoint.success);
    assert!(!checkpoint.is_last);
    assert_eq!(checkpoint.options(), &[Decision::NextStep, Decision::Close]);
    assert!(project_dir.join("shcblock_pre.bin").exists());
    assert!(!project_dir.join("fresh.bin").exists());
    assert!(!project_dir.join("block").exists());
    assert!(!project_dir.join("image4").exists());

    let commands: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            AppEvent::ProcessOutput(StreamKind::Command, text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].ends_with("turdusra1n -D"));
    assert!(commands[1].contains("'"), "paths with spaces are quoted");
    assert!(commands[1].contains("--get-shcblock"));

    let log = infos(&events);
    assert!(log.contains(&"Moved from block/fresh.bin"));
    assert!(log.contains(&"Renamed fresh.bin to shcblock_pre.bin"));

    // Step 2 through the checkpoint
    assert!(orchestrator.apply_decision(&checkpoint, Decision::NextStep));
    let (checkpoint, _) = next_checkpoint(&mut orchestrator, &mut rx).await;
    assert_eq!(checkpoint.index, 1);
    assert!(checkpoint.success);
    assert!(project_dir.join("restore_done").exists());

    assert_eq!(orchestrator.session().steps.progress(), (2, 5));
    assert_eq!(orchestrator.session().next_step(), Some(2));
    assert!(!orchestrator.is_executing());
}

#[tokio::test]
async fn test_single_flight_rejects_second_step() {
    let env = TestEnvironment::new();
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();

    assert!(orchestrator.execute_step(0));
    drain(&mut rx);
    assert!(!orchestrator.execute_step(2));
    assert_eq!(orchestrator.steps()[2].status, StepStatus::Pending);
    assert!(warnings(&drain(&mut rx)).contains(&"A step is already running"));

    let (checkpoint, _) = next_checkpoint(&mut orchestrator, &mut rx).await;
    assert_eq!(checkpoint.index, 0);
}

#[tokio::test]
async fn test_failed_restore_offers_retry() {
    let env = TestEnvironment::with_failing_merula();
    let project_dir = env.project_dir();
    fs::write(project_dir.join("shcblock_pre.bin"), b"shc").unwrap();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();
    assert_eq!(orchestrator.session().next_step(), Some(1));

    assert!(orchestrator.execute_step(1));
    let (checkpoint, events) = next_checkpoint(&mut orchestrator, &mut rx).await;

    assert!(!checkpoint.success);
    assert_eq!(checkpoint.options(), &[Decision::Retry, Decision::Close]);
    assert_eq!(orchestrator.steps()[1].status, StepStatus::Failed);
    assert!(!project_dir.join("restore_done").exists());
    assert!(events.contains(&AppEvent::ProcessFinished {
        success: false,
        exit_code: 1
    }));
    assert!(events.contains(&AppEvent::ChainFinished(false)));

    // Retry runs the same step again
    assert!(orchestrator.apply_decision(&checkpoint, Decision::Retry));
    assert_eq!(orchestrator.steps()[1].status, StepStatus::Running);
    let (checkpoint, _) = next_checkpoint(&mut orchestrator, &mut rx).await;
    assert_eq!(checkpoint.index, 1);
    assert!(!orchestrator.apply_decision(&checkpoint, Decision::Close));
    assert!(!orchestrator.apply_decision(&checkpoint, Decision::NextStep));
}

#[tokio::test]
async fn test_failed_chain_still_flattens_working_dirs() {
    let env = TestEnvironment::with_merula(CRASHING_MERULA);
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();

    assert!(orchestrator.execute_step(0));
    let (checkpoint, events) = next_checkpoint(&mut orchestrator, &mut rx).await;

    assert!(!checkpoint.success);
    assert_eq!(checkpoint.options(), &[Decision::Retry, Decision::Close]);
    assert_eq!(orchestrator.steps()[0].status, StepStatus::Failed);
    assert_eq!(fs::read(project_dir.join("x.bin")).unwrap(), b"x");
    assert_eq!(fs::read(project_dir.join("y.img4")).unwrap(), b"y");
    assert!(!project_dir.join("block").exists());
    assert!(!project_dir.join("image4").exists());
    // A failed chain never names an artifact
    assert!(!project_dir.join("shcblock_pre.bin").exists());

    let log = infos(&events);
    assert!(log.contains(&"Moved from block/x.bin"));
    assert!(log.contains(&"Moved from image4/y.img4"));
}

#[tokio::test]
async fn test_clean_exit_without_artifact_fails_step() {
    let env = TestEnvironment::with_rain(SILENT_RAIN);
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();

    // Get SHC (post): `turdusra1n -g` exits 0 but dumps nothing
    assert!(orchestrator.execute_step(2));
    let (checkpoint, events) = next_checkpoint(&mut orchestrator, &mut rx).await;

    assert!(events.contains(&AppEvent::ProcessFinished {
        success: true,
        exit_code: 0
    }));
    assert!(events.contains(&AppEvent::ChainFinished(true)));
    assert!(
        errors(&events)
            .contains(&"Error: No .bin file found, no artifact produced for shcblock_post.bin")
    );
    assert!(!checkpoint.success);
    assert_eq!(checkpoint.options(), &[Decision::Retry, Decision::Close]);
    assert_eq!(orchestrator.steps()[2].status, StepStatus::Failed);
    assert!(!project_dir.join("shcblock_post.bin").exists());
    assert!(!orchestrator.is_executing());
}

#[tokio::test]
async fn test_stop_holds_session_until_chain_reports() {
    let env = TestEnvironment::with_rain(SLOW_RAIN);
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();

    assert!(orchestrator.execute_step(0));
    tokio::time::sleep(Duration::from_millis(200)).await;
    orchestrator.stop().await;

    // The stopped step is unresolved until its chain result is read
    assert!(orchestrator.is_executing());
    assert!(!orchestrator.execute_step(2));
    assert_eq!(orchestrator.steps()[2].status, StepStatus::Pending);

    let (checkpoint, events) = next_checkpoint(&mut orchestrator, &mut rx).await;
    assert_eq!(checkpoint.index, 0);
    assert!(!checkpoint.success);
    assert_eq!(checkpoint.options(), &[Decision::Retry, Decision::Close]);
    assert_eq!(orchestrator.steps()[0].status, StepStatus::Failed);
    assert!(!orchestrator.is_executing());
    assert!(warnings(&events).contains(&"A step is already running"));
    assert!(events.contains(&AppEvent::ProcessFinished {
        success: false,
        exit_code: KILLED_EXIT_CODE
    }));

    // The next step gets its own chain result and artifact
    assert!(orchestrator.execute_step(2));
    let (checkpoint, _) = next_checkpoint(&mut orchestrator, &mut rx).await;
    assert_eq!(checkpoint.index, 2);
    assert!(checkpoint.success);
    assert!(project_dir.join("shcblock_post.bin").exists());
    assert_eq!(orchestrator.steps()[0].status, StepStatus::Failed);
    assert_eq!(orchestrator.steps()[2].status, StepStatus::Success);
}

#[tokio::test]
async fn test_precondition_failure_runs_nothing() {
    let env = TestEnvironment::new();
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();

    // Boot without pteblock: precondition, nothing runs
    assert!(!orchestrator.execute_step(4));
    let events = drain(&mut rx);
    assert!(warnings(&events).contains(&"Need pteblock.bin"));
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, AppEvent::ProcessOutput(..)))
    );
    assert_eq!(orchestrator.steps()[4].status, StepStatus::Failed);
    assert!(!orchestrator.is_executing());
    assert!(!project_dir.join("block").exists());
}

#[tokio::test]
async fn test_resume_from_markers() {
    let env = TestEnvironment::new();
    let project_dir = env.project_dir();
    fs::write(project_dir.join("shcblock_pre.bin"), b"shc").unwrap();
    fs::write(project_dir.join("restore_done"), b"").unwrap();

    let (mut orchestrator, _rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();

    let statuses: Vec<StepStatus> = orchestrator.steps().iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Success,
            StepStatus::Success,
            StepStatus::Pending,
            StepStatus::Pending,
            StepStatus::Pending,
        ]
    );
    assert_eq!(orchestrator.session().next_step(), Some(2));

    // Switching pipelines re-derives progress for the new table
    orchestrator.set_chip(ChipVariant::A10).unwrap();
    assert_eq!(orchestrator.steps()[0].status, StepStatus::Success);
    assert_eq!(orchestrator.steps()[1].status, StepStatus::Pending);
    assert_eq!(
        ProjectState::open(&project_dir).unwrap().0.chip(),
        ChipVariant::A10
    );
}

#[tokio::test]
async fn test_untethered_requires_generator() {
    let env = TestEnvironment::new();
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.set_mode(RestoreMode::Untethered).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();
    assert!(!orchestrator.session().steps_enabled());

    let generator = orchestrator.select_blob(&env.blob(None)).unwrap();
    assert_eq!(generator, UNKNOWN_GENERATOR);
    assert!(!orchestrator.session().steps_enabled());
    assert!(warnings(&drain(&mut rx)).contains(&"Generator: UNKNOWN (not found in blob)"));

    let generator = orchestrator.select_blob(&env.blob(Some(TEST_GENERATOR))).unwrap();
    assert_eq!(generator, TEST_GENERATOR);
    assert!(orchestrator.session().steps_enabled());
    assert!(infos(&drain(&mut rx)).contains(&"Generator: 0x1111222233334444"));
}

#[tokio::test]
async fn test_a10_untethered_restore_uses_generator() {
    let env = TestEnvironment::new();
    let project_dir = env.project_dir();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.set_mode(RestoreMode::Untethered).unwrap();
    orchestrator.open_project(&project_dir).unwrap();
    orchestrator.set_chip(ChipVariant::A10).unwrap();
    orchestrator.select_firmware(&env.firmware()).unwrap();
    orchestrator.select_blob(&env.blob(Some(TEST_GENERATOR))).unwrap();
    assert_eq!(orchestrator.steps().len(), 1);

    assert!(orchestrator.execute_step(0));
    let (checkpoint, events) = next_checkpoint(&mut orchestrator, &mut rx).await;
    assert!(checkpoint.success);
    assert!(checkpoint.is_last);
    assert_eq!(checkpoint.options(), &[Decision::Close]);
    assert!(project_dir.join("restore_done").exists());

    let stdout: String = events
        .iter()
        .filter_map(|event| match event {
            AppEvent::ProcessOutput(StreamKind::Stdout, text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(stdout.contains("turdusra1n -Db 0x1111222233334444"));
    assert!(stdout.contains("turdus_merula -w --load-shsh"));
}

#[tokio::test]
async fn test_create_project_keeps_session_chip() {
    let env = TestEnvironment::new();
    let (mut orchestrator, mut rx) = env.orchestrator();
    orchestrator.set_chip(ChipVariant::A10).unwrap();

    let root = orchestrator
        .create_project(env.path(), Some("a10-restore"))
        .unwrap();
    assert_eq!(root, env.path().join("a10-restore"));
    assert_eq!(orchestrator.session().chip, ChipVariant::A10);
    assert_eq!(
        ProjectState::open(&root).unwrap().0.chip(),
        ChipVariant::A10
    );
    assert!(infos(&drain(&mut rx)).iter().any(|m| m.starts_with("Created new project")));

    let err = orchestrator.create_project(env.path(), Some("  ")).unwrap_err();
    assert!(err.to_string().contains("project name is empty"));
}
