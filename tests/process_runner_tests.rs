//! Process runner tests
//!
//! Chain ordering and abort semantics, single-flight behavior, stdin
//! forwarding and operator stop, using plain `sh` commands.

#![cfg(unix)]

use m3rula::config::RunnerConfig;
use m3rula::models::{AppEvent, StreamKind};
use m3rula::services::{KILLED_EXIT_CODE, ProcessRunner};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn runner() -> (ProcessRunner, mpsc::UnboundedReceiver<AppEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = RunnerConfig {
        settle_delay_ms: 10,
        ..RunnerConfig::default()
    };
    (ProcessRunner::new(config, tx), rx)
}

/// Collect events until `ChainFinished`
async fn until_chain_finished(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
    tokio::time::timeout(Duration::from_secs(10), async {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, AppEvent::ChainFinished(_));
            events.push(event);
            if done {
                break;
            }
        }
        events
    })
    .await
    .expect("timed out waiting for the chain")
}

fn stdout_text(events: &[AppEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            AppEvent::ProcessOutput(StreamKind::Stdout, text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_chain_runs_in_order() {
    let (mut runner, mut rx) = runner();
    assert!(runner.run_chain(vec!["echo first".to_string(), "echo second".to_string()]));

    let events = until_chain_finished(&mut rx).await;
    assert_eq!(stdout_text(&events), "first\nsecond\n");
    assert_eq!(
        events.first(),
        Some(&AppEvent::ProcessOutput(
            StreamKind::Command,
            "$ echo first".to_string()
        ))
    );
    let finished = events
        .iter()
        .filter(|event| matches!(event, AppEvent::ProcessFinished { success: true, exit_code: 0 }))
        .count();
    assert_eq!(finished, 2);
    assert_eq!(events.last(), Some(&AppEvent::ChainFinished(true)));
    assert!(!runner.is_running());
}

#[tokio::test]
async fn test_chain_aborts_after_failure() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let marker = temp_dir.path().join("marker");
    let (mut runner, mut rx) = runner();

    assert!(runner.run_chain(vec![
        "echo oops >&2; false".to_string(),
        format!("touch '{}'", marker.display()),
    ]));
    let events = until_chain_finished(&mut rx).await;

    assert!(!marker.exists());
    assert!(events.contains(&AppEvent::ProcessOutput(
        StreamKind::Stderr,
        "oops\n".to_string()
    )));
    assert!(events.contains(&AppEvent::ProcessFinished {
        success: false,
        exit_code: 1
    }));
    let commands = events
        .iter()
        .filter(|event| matches!(event, AppEvent::ProcessOutput(StreamKind::Command, _)))
        .count();
    assert_eq!(commands, 1);
    assert_eq!(events.last(), Some(&AppEvent::ChainFinished(false)));
}

#[tokio::test]
async fn test_single_flight() {
    let (mut runner, mut rx) = runner();
    assert!(runner.run_chain(vec!["sleep 0.3".to_string()]));
    assert!(runner.is_running());
    assert!(!runner.run("echo nope"));
    assert!(!runner.run_chain(vec!["echo nope".to_string()]));

    let events = until_chain_finished(&mut rx).await;
    assert!(!stdout_text(&events).contains("nope"));
    assert!(!runner.is_running());

    // Idle again: a new chain is accepted right away
    assert!(runner.run_chain(vec!["true".to_string()]));
    until_chain_finished(&mut rx).await;
}

#[tokio::test]
async fn test_send_input_reaches_process() {
    let (mut runner, mut rx) = runner();
    assert!(runner.run_chain(vec!["read line; echo got:$line".to_string()]));

    // stdin is attached once the process has been spawned
    let mut sent = false;
    for _ in 0..100 {
        if runner.send_input("hello").await.is_ok() {
            sent = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(sent, "stdin never became available");

    let events = until_chain_finished(&mut rx).await;
    assert!(stdout_text(&events).contains("got:hello"));
    assert_eq!(events.last(), Some(&AppEvent::ChainFinished(true)));
}

#[tokio::test]
async fn test_stop_fails_chain() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let marker = temp_dir.path().join("marker");
    let (mut runner, mut rx) = runner();

    assert!(runner.run_chain(vec![
        "sleep 30".to_string(),
        format!("touch '{}'", marker.display()),
    ]));
    tokio::time::sleep(Duration::from_millis(200)).await;

    runner.stop().await;
    assert!(!runner.is_running());

    let events = until_chain_finished(&mut rx).await;
    assert!(events.contains(&AppEvent::ProcessFinished {
        success: false,
        exit_code: KILLED_EXIT_CODE
    }));
    assert_eq!(events.last(), Some(&AppEvent::ChainFinished(false)));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = RunnerConfig {
        shell: "/nonexistent/shell".to_string(),
        ..RunnerConfig::default()
    };
    let mut runner = ProcessRunner::new(config, tx);

    assert!(runner.run_chain(vec!["true".to_string()]));
    let events = until_chain_finished(&mut rx).await;
    assert!(events.contains(&AppEvent::ProcessFinished {
        success: false,
        exit_code: KILLED_EXIT_CODE
    }));
    assert_eq!(events.last(), Some(&AppEvent::ChainFinished(false)));
}
