//! Log do corretor: terminal (stderr, sem quebrar as barras de progresso) e
//! um arquivo `logs/avaliacao_<AAAAmmdd_HHMMSS>.log` por execução.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use indicatif::MultiProgress;
use tracing::{Subscriber, warn};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::ui::LogWriter;

/// `avaliacao_20250827_091750.log` for 2025-08-27 09:17:50.
pub fn log_file_name(now: NaiveDateTime) -> String {
    now.format("avaliacao_%Y%m%d_%H%M%S.log").to_string()
}

/// Create `dir` if needed and a fresh log file inside it.
pub fn open_log_file(dir: &Path, now: NaiveDateTime) -> io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(now));
    let file = File::create(&path)?;
    Ok((path, file))
}

/// `RUST_LOG` wins; otherwise `debug` with `--verbose`, else the configured level.
pub fn env_filter(verbose: bool, log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if verbose { "debug" } else { log_level }))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console layer on `console`, plus a plain-text layer on `file` when given.
fn build_subscriber<W>(
    filter: EnvFilter,
    console: W,
    file: Option<File>,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(console))
        .with(file_layer)
}

/// Install the global subscriber. Returns the log file path; without one
/// (directory not writable) logging continues on the terminal only.
pub fn init_tracing(
    verbose: bool,
    log_level: &str,
    log_dir: &Path,
    multi: MultiProgress,
) -> Result<Option<PathBuf>, TryInitError> {
    let (path, file, failure) = match open_log_file(log_dir, Local::now().naive_local()) {
        Ok((path, file)) => (Some(path), Some(file), None),
        Err(e) => (None, None, Some(e)),
    };

    build_subscriber(env_filter(verbose, log_level), LogWriter::stderr(multi), file).try_init()?;

    if let Some(e) = failure {
        warn!(dir = %log_dir.display(), "could not create log file: {e}");
    }
    Ok(path)
}
