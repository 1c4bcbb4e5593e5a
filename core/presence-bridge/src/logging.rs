//! Tracing setup for the bridge.
//!
//! Stdout carries notices back to the host, so logs go to a daily file under
//! `~/.vault-presence/logs/`, or stderr when that directory is unavailable.

use presence_core::get_data_dir;
use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "VAULT_PRESENCE_LOG";
const DEBUG_ENV: &str = "VAULT_PRESENCE_DEBUG_LOG";
const LOG_FILE: &str = "bridge.log";

fn debug_forced() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn build_filter() -> EnvFilter {
    if debug_forced() {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn log_dir() -> Option<PathBuf> {
    let dir = get_data_dir()?.join("logs");
    fs_err::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Installs the global subscriber. The returned guard flushes the file
/// writer on drop and must live until the process exits.
pub fn init() -> Option<WorkerGuard> {
    let filter = build_filter();

    let Some(dir) = log_dir() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return None;
    };

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}
