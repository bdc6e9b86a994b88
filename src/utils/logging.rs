//! Logging utilities and initialization for m3rula

use anyhow::Result;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::models::AppEvent;

/// Pick the level from `-q` / `-v` flags
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Initialize logging for the CLI and TUI
pub fn init_cli_logging(verbose: u8, quiet: bool, tui_mode: bool) -> Result<()> {
    let level = level_for(verbose, quiet);

    if tui_mode {
        // File logging only for TUI mode to avoid terminal interference
        init_file_logger(level)?;
    } else {
        Builder::from_default_env()
            .target(Target::Stderr)
            .filter_level(level)
            .format_timestamp_secs()
            .format_module_path(false)
            .init();
    }

    #[cfg(debug_assertions)]
    log_panics::init();

    log::debug!("m3rula logging initialized with level: {:?}", level);
    Ok(())
}

/// `<data dir>/m3rula/logs`
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("m3rula")
        .join("logs")
}

fn init_file_logger(level: LevelFilter) -> Result<()> {
    use std::fs::OpenOptions;

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("m3rula.log"))?;

    Builder::from_default_env()
        .target(Target::Pipe(Box::new(file)))
        .filter_level(level)
        .format_timestamp_secs()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                buf.timestamp(),
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .init();

    Ok(())
}

/// Operator-facing system log. Every message also goes to the `log` facade.
#[derive(Clone)]
pub struct EventLogger {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventLogger {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    pub fn error(&self, message: String) {
        log::error!("{}", message);
        if let Err(e) = self.tx.send(AppEvent::Error(message)) {
            log::error!("Failed to send error event: {}", e);
        }
    }

    /// Warnings double as blocking notices in the front-ends
    pub fn warning(&self, message: String) {
        log::warn!("{}", message);
        if let Err(e) = self.tx.send(AppEvent::Warning(message)) {
            log::warn!("Failed to send warning event: {}", e);
        }
    }

    pub fn info(&self, message: String) {
        log::info!("{}", message);
        if let Err(e) = self.tx.send(AppEvent::Info(message)) {
            log::info!("Failed to send info event: {}", e);
        }
    }

    /// File only, not shown to the operator
    pub fn debug(&self, message: &str) {
        log::debug!("{}", message);
    }
}

/// Format-string logging through an [`EventLogger`]
#[macro_export]
macro_rules! event_log {
    ($logger:expr, error, $($arg:tt)*) => {
        $logger.error(format!($($arg)*))
    };
    ($logger:expr, warning, $($arg:tt)*) => {
        $logger.warning(format!($($arg)*))
    };
    ($logger:expr, info, $($arg:tt)*) => {
        $logger.info(format!($($arg)*))
    };
    ($logger:expr, debug, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_event_logger_sends_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let logger = EventLogger::new(tx);

        logger.error("test error".to_string());
        event_log!(logger, warning, "Need {}", "pteblock.bin");
        logger.info("test info".to_string());
        logger.debug("not forwarded");

        assert_eq!(rx.recv().await, Some(AppEvent::Error("test error".to_string())));
        assert_eq!(
            rx.recv().await,
            Some(AppEvent::Warning("Need pteblock.bin".to_string()))
        );
        assert_eq!(rx.recv().await, Some(AppEvent::Info("test info".to_string())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_log_level_selection() {
        assert_eq!(level_for(0, true), LevelFilter::Error);
        assert_eq!(level_for(0, false), LevelFilter::Info);
        assert_eq!(level_for(1, false), LevelFilter::Debug);
        assert_eq!(level_for(2, false), LevelFilter::Trace);
    }
}
