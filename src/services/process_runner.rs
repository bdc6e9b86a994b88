//! Single-flight external process runner
//!
//! Runs one shell command at a time, forwarding stdout/stderr chunks and exit
//! status as [`AppEvent`]s. A chain of commands runs front to back; each
//! command only starts after the previous one exited with status 0.

use crate::config::RunnerConfig;
use crate::errors::{M3rulaError, Result};
use crate::models::{AppEvent, StreamKind};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

/// Exit code reported when the process was killed by a signal
pub const KILLED_EXIT_CODE: i32 = -1;

const READ_CHUNK: usize = 4096;
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

struct ActiveChain {
    /// Cleared by the chain task before it reports its final events
    running: Arc<AtomicBool>,
    cancel: watch::Sender<bool>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    handle: JoinHandle<()>,
    chained: bool,
}

pub struct ProcessRunner {
    config: RunnerConfig,
    tx: mpsc::UnboundedSender<AppEvent>,
    active: Option<ActiveChain>,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            config,
            tx,
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.running.load(Ordering::SeqCst))
    }

    /// Start a single command. Returns false without doing anything if a
    /// process is already live.
    pub fn run(&mut self, command: impl Into<String>) -> bool {
        self.start(vec![command.into()], false)
    }

    /// Start an ordered chain. Emits `ChainFinished` once the chain ends.
    pub fn run_chain(&mut self, commands: Vec<String>) -> bool {
        if commands.is_empty() {
            log::warn!("Refusing to run an empty command chain");
            return false;
        }
        self.start(commands, true)
    }

    fn start(&mut self, commands: Vec<String>, chained: bool) -> bool {
        if self.is_running() {
            log::warn!("Process already running, ignoring request");
            return false;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let stdin = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let task = ChainTask {
            running: running.clone(),
            shell: self.config.shell.clone(),
            settle_delay: self.config.settle_delay(),
            tx: self.tx.clone(),
            stdin: stdin.clone(),
            cancel: cancel_rx,
        };
        let handle = tokio::spawn(task.drive(commands, chained));

        self.active = Some(ActiveChain {
            running,
            cancel: cancel_tx,
            stdin,
            handle,
            chained,
        });
        true
    }

    /// Kill the running process and drop the rest of the chain. Waits at most
    /// the configured stop timeout.
    pub async fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if active.handle.is_finished() {
            return;
        }

        let _ = active.cancel.send(true);
        let stop_timeout = self.config.stop_timeout();
        match tokio::time::timeout(stop_timeout, &mut active.handle).await {
            Ok(_) => log::info!("Process stopped"),
            Err(_) => {
                log::warn!(
                    "Process did not exit within {}ms, abandoning it",
                    stop_timeout.as_millis()
                );
                active.handle.abort();
                active.running.store(false, Ordering::SeqCst);
                // The aborted task never reports, so close the chain here
                if active.chained {
                    let _ = self.tx.send(AppEvent::ChainFinished(false));
                }
            }
        }
    }

    /// Write `text` followed by a newline to the running process
    pub async fn send_input(&self, text: &str) -> Result<()> {
        let active = self
            .active
            .as_ref()
            .filter(|active| active.running.load(Ordering::SeqCst))
            .ok_or_else(|| M3rulaError::Process("no process is running".to_string()))?;

        let mut guard = active.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| M3rulaError::Process("process stdin is unavailable".to_string()))?;

        stdin.write_all(text.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Owns the child processes of one chain
struct ChainTask {
    running: Arc<AtomicBool>,
    shell: String,
    settle_delay: Duration,
    tx: mpsc::UnboundedSender<AppEvent>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    cancel: watch::Receiver<bool>,
}

impl ChainTask {
    async fn drive(mut self, commands: Vec<String>, chained: bool) {
        let mut chain_ok = true;

        for (index, command) in commands.iter().enumerate() {
            if index > 0 {
                let interrupted = tokio::select! {
                    _ = tokio::time::sleep(self.settle_delay) => false,
                    _ = cancelled(&mut self.cancel) => true,
                };
                if interrupted {
                    log::info!("Chain cancelled before: {}", command);
                    chain_ok = false;
                    break;
                }
            }

            let (success, exit_code) = self.run_one(command).await;
            let last = !success || index + 1 == commands.len();
            if last {
                // Listeners may start the next chain as soon as they see the final event
                self.running.store(false, Ordering::SeqCst);
            }
            let _ = self
                .tx
                .send(AppEvent::ProcessFinished { success, exit_code });

            if !success {
                if index + 1 < commands.len() {
                    log::info!(
                        "Aborting chain, {} command(s) skipped",
                        commands.len() - index - 1
                    );
                }
                chain_ok = false;
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        if chained {
            let _ = self.tx.send(AppEvent::ChainFinished(chain_ok));
        }
    }

    /// Run one command to completion; returns (success, exit code)
    async fn run_one(&mut self, command: &str) -> (bool, i32) {
        let _ = self.tx.send(AppEvent::ProcessOutput(
            StreamKind::Command,
            format!("$ {}", command),
        ));
        log::debug!("Spawning: {} -c {}", self.shell, command);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::error!("Failed to start {}: {}", self.shell, e);
                let _ = self.tx.send(AppEvent::ProcessOutput(
                    StreamKind::Stderr,
                    format!("Failed to start process: {}\n", e),
                ));
                return (false, KILLED_EXIT_CODE);
            }
        };

        *self.stdin.lock().await = child.stdin.take();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_output(stdout, StreamKind::Stdout, self.tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_output(stderr, StreamKind::Stderr, self.tx.clone()));
        }

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancelled(&mut self.cancel) => None,
        };
        let status = match waited {
            Some(status) => status,
            None => {
                log::info!("Killing: {}", command);
                let _ = child.start_kill();
                child.wait().await
            }
        };

        // Output must be fully forwarded before the exit event
        for reader in readers {
            let _ = tokio::time::timeout(READER_DRAIN_TIMEOUT, reader).await;
        }
        self.stdin.lock().await.take();

        let exit_code = match &status {
            Ok(status) => status.code().unwrap_or(KILLED_EXIT_CODE),
            Err(e) => {
                log::error!("Failed to wait for process: {}", e);
                KILLED_EXIT_CODE
            }
        };
        (exit_code == 0, exit_code)
    }
}

/// Resolves once `stop` was requested or the runner went away
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

fn forward_output<R>(
    mut reader: R,
    kind: StreamKind,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    // Chunks, not lines: interactive prompts are not newline terminated
    tokio::spawn(async move {
        let mut buffer = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buffer[..n]).into_owned();
                    if tx.send(AppEvent::ProcessOutput(kind, chunk)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> (ProcessRunner, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProcessRunner::new(RunnerConfig::default(), tx), rx)
    }

    #[tokio::test]
    async fn test_run_reports_exit_code() {
        let (mut runner, mut rx) = runner();
        assert!(runner.run("exit 3"));

        let mut finished = None;
        while let Some(event) = rx.recv().await {
            if let AppEvent::ProcessFinished { success, exit_code } = event {
                finished = Some((success, exit_code));
                break;
            }
        }
        assert_eq!(finished, Some((false, 3)));
    }

    #[tokio::test]
    async fn test_empty_chain_rejected() {
        let (mut runner, _rx) = runner();
        assert!(!runner.run_chain(Vec::new()));
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_send_input_without_process_fails() {
        let (runner, _rx) = runner();
        let err = runner.send_input("").await.unwrap_err();
        assert!(matches!(err, M3rulaError::Process(_)));
    }
}
