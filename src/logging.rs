use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

const LOG_PREFIX: &str = "threat-ai.log";
const RETENTION_DAYS: u64 = 7;

/// Initialize file logging. The terminal belongs to the UI, so nothing is
/// written to stdout. Keep the guard alive until exit or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig, dir: &Path) -> WorkerGuard {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let is_json = format.eq_ignore_ascii_case("json");

    // daily() names files threat-ai.log.YYYY-MM-DD
    let file_appender = tracing_appender::rolling::daily(dir, LOG_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    if let Err(e) = Registry::default().with(filter).with(file_layer).try_init() {
        eprintln!("Logging already initialized: {}", e);
    }

    if let Err(e) = cleanup_old_logs(dir, RETENTION_DAYS, SystemTime::now()) {
        eprintln!("Failed to clean up old logs: {}", e);
    }

    guard
}

/// Remove our log files last modified more than `days` days before `now`
fn cleanup_old_logs(dir: &Path, days: u64, now: SystemTime) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let threshold = Duration::from_secs(days * 24 * 3600);
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_PREFIX));
        if !path.is_file() || !ours {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > threshold) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to remove old log file {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}
