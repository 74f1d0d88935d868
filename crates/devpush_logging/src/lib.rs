//! Shared tracing setup for devpush binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "devpush=info,devpush_db=info";
const VERBOSE_LOG_FILTER: &str = "devpush=debug,devpush_db=debug";
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging options for a binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug level for devpush crates when `RUST_LOG` is unset
    pub verbose: bool,
    /// Also append to `<devpush home>/logs/<app_name>.log`
    pub log_to_file: bool,
}

/// Install the global subscriber: stderr always, plus the optional log file.
///
/// `RUST_LOG` overrides the built-in filter for both outputs.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let file_layer = if config.log_to_file {
        let dir = ensure_logs_dir()?;
        let file = open_log_file(&dir, config.app_name)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(env_filter(config.verbose)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(env_filter(config.verbose)),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
}

/// devpush home: `$DEVPUSH_HOME`, else `~/.devpush`.
pub fn devpush_home() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("DEVPUSH_HOME") {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(".devpush"))
        .context("Could not determine home directory")
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(devpush_home()?.join("logs"))
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Open `<dir>/<name>.log` for appending. An oversized file is moved to
/// `<name>.log.1` first, replacing any older backup.
fn open_log_file(dir: &Path, app_name: &str) -> Result<File> {
    let name = sanitize_name(app_name);
    let path = dir.join(format!("{}.log", name));

    let oversized = fs::metadata(&path)
        .map(|m| m.len() > MAX_LOG_FILE_SIZE)
        .unwrap_or(false);
    if oversized {
        let backup = dir.join(format!("{}.log.1", name));
        fs::rename(&path, &backup)
            .with_context(|| format!("Failed to rotate log file: {}", path.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
