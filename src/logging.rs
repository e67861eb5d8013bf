//! Structured logging via `tracing`.
//!
//! `RUST_LOG` takes precedence over the configured level. The GUI logs to
//! stderr; the terminal UI logs to a file so output never lands on the
//! alternate screen.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Install the global subscriber.
///
/// The returned guard flushes buffered file output on drop and must be held
/// for the lifetime of the program. Installing twice is a no-op.
pub fn init(level: &str, target: LogTarget) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match target {
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
        LogTarget::File(path) => {
            let dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir);
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "reporadial.log".into());
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .try_init();
            Some(guard)
        }
    }
}

/// Default log file for the terminal UI.
pub fn default_tui_log_path() -> PathBuf {
    std::env::temp_dir().join("reporadial-tui.log")
}
