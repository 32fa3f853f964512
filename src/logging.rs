//! Logging setup
//!
//! Logs to `~/.livingbooks/logs/` with one file per day. The filter comes from
//! `$LIVINGBOOKS_LOG` (tracing `EnvFilter` syntax), defaulting to `info`, or
//! `debug` when tracing is requested on the command line.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const KEEP_DAYS: i64 = 7;

fn log_dir() -> Option<PathBuf> {
    crate::storage::app_dir().ok().map(|d| d.join("logs"))
}

/// Get path to today's log file
pub fn log_path() -> Option<PathBuf> {
    let date = Local::now().format("%Y-%m-%d");
    Some(log_dir()?.join(format!("livingbooks-{}.log", date)))
}

fn filter(trace: bool) -> EnvFilter {
    EnvFilter::try_from_env("LIVINGBOOKS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if trace { "debug" } else { "info" }))
}

/// Install the global subscriber (call once at startup; later calls are
/// no-ops). Falls back to warnings on stderr when the log file cannot be
/// opened.
pub fn init(trace: bool) {
    let file = log_path().and_then(|path| {
        fs::create_dir_all(path.parent()?).ok()?;
        OpenOptions::new().create(true).append(true).open(&path).ok()
    });

    let result = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter(trace))
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("warn"))
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

/// Clean up old logs (keep last 7 days)
pub fn cleanup_old_logs() {
    let Some(dir) = log_dir() else {
        return;
    };
    let Ok(entries) = fs::read_dir(&dir) else {
        return;
    };

    let cutoff = Local::now() - chrono::Duration::days(KEEP_DAYS);
    for entry in entries.flatten() {
        let is_log = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with("livingbooks-") && name.ends_with(".log"))
            .unwrap_or(false);
        if !is_log {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified: chrono::DateTime<Local> = modified.into();
            if modified < cutoff && fs::remove_file(entry.path()).is_ok() {
                tracing::debug!("removed old log {}", entry.path().display());
            }
        }
    }
}
