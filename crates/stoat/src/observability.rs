//! Observability setup: structured logging.
//!
//! stdout is reserved for command output; logs go to a JSONL file (or to
//! stderr when no writable log location exists).

use anyhow::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "STOAT_LOG_PATH";
const ENV_LOG_DIR: &str = "STOAT_LOG_DIR";
const SERVICE: &str = env!("CARGO_PKG_NAME");
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Guard that must be held for the lifetime of the application to ensure
/// buffered log lines are flushed on exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize observability (logging).
///
/// Log location resolution, highest priority first: `STOAT_LOG_PATH` (exact
/// file), `STOAT_LOG_DIR`, the configured `log_dir`, then platform defaults
/// (XDG data dir, current directory). Falls back to stderr when nothing is
/// writable.
///
/// Returns a guard that must be held for the application lifetime.
pub fn init_observability(
    config_log_dir: Option<PathBuf>,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (log_writer, log_guard) = match build_appender(config_log_dir) {
        Some(appender) => tracing_appender::non_blocking(appender),
        None => {
            // stdout is reserved for command output, so the fallback is stderr.
            eprintln!("Warning: no writable log directory found. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(log_writer),
        )
        .init();

    tracing::debug!("observability initialized");

    Ok(ObservabilityGuard {
        _log_guard: log_guard,
    })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > default_level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Resolve the log target and build a file appender for it.
fn build_appender(config_log_dir: Option<PathBuf>) -> Option<RollingFileAppender> {
    if let Some(path) = std::env::var_os(ENV_LOG_PATH).map(PathBuf::from) {
        let file_name = path.file_name()?.to_str()?.to_string();
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        ensure_writable(&dir, &file_name).ok()?;
        return Some(tracing_appender::rolling::never(dir, file_name));
    }

    let file_name = format!("{SERVICE}{LOG_FILE_SUFFIX}");

    let dir_override = std::env::var_os(ENV_LOG_DIR).map(PathBuf::from);
    if let Some(dir) = dir_override.or(config_log_dir) {
        ensure_writable(&dir, &file_name).ok()?;
        return Some(tracing_appender::rolling::daily(dir, file_name));
    }

    for dir in default_log_dirs() {
        if ensure_writable(&dir, &file_name).is_ok() {
            return Some(tracing_appender::rolling::daily(dir, file_name));
        }
    }

    None
}

/// Candidate log directories, in order of preference.
fn default_log_dirs() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // XDG-compliant data directory
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", SERVICE) {
        candidates.push(proj_dirs.data_local_dir().join("logs"));
    }

    if let Ok(dir) = std::env::current_dir() {
        candidates.push(dir);
    }

    candidates
}

/// Verify `dir` exists (creating it if needed) and that `file_name` can be
/// opened for appending inside it.
fn ensure_writable(dir: &Path, file_name: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(file_name))?;
    Ok(())
}
