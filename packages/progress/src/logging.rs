//! Tracing subscriber setup
//!
//! Console output is always on. When [`LogConfig::file_dir`] is set, the same
//! events also go to a daily-rotated file there through a non-blocking writer.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "wordwise.log";

/// Keeps the file writer flushing; hold it for the life of the process
pub struct FileLogGuard {
    _worker: WorkerGuard,
}

/// Filter from `RUST_LOG`-style directives, `info` when they do not parse
pub fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(dir: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber.
///
/// Returns a guard only when file output was set up and the subscriber was
/// installed. A second call leaves the first subscriber in place.
pub fn init_tracing(config: &LogConfig) -> Option<FileLogGuard> {
    let file = config.file_dir.as_deref().and_then(|dir| match file_writer(dir) {
        Ok(pair) => Some(pair),
        Err(err) => {
            // No subscriber yet to report through
            eprintln!("file logging disabled, cannot use {}: {err}", dir.display());
            None
        }
    });
    let (writer, worker) = file.unzip();

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(fmt::layer().with_target(true))
        .with(writer.map(|w| fmt::layer().with_writer(w).with_ansi(false)))
        .try_init()
        .ok()?;

    worker.map(|worker| FileLogGuard { _worker: worker })
}
