//! Optional file logging for hosts that do not install their own logger.
//!
//! # Responsibility
//! - Route the crate's `event=... module=... status=...` lines (units of
//!   work, repositories, contexts, stores) to rotating files.
//! - Resolve the level from the caller or `UNITWORK_LOG_LEVEL`.
//!
//! # Invariants
//! - At most one logger per process; repeating the active config is a no-op.
//! - A different config after the first init is rejected, never applied.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::info;
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable consulted by `LogConfig::from_env`.
pub const LOG_LEVEL_ENV: &str = "UNITWORK_LOG_LEVEL";

const LOG_FILE_BASENAME: &str = "unitwork";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 4;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    config: LogConfig,
    handle: LoggerHandle,
}

/// Errors from logger configuration and startup.
#[derive(Debug)]
pub enum LogError {
    InvalidLevel(String),
    InvalidDirectory(String),
    CreateDirectory {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    AlreadyInitialized {
        active: LogConfig,
        requested: LogConfig,
    },
}

impl Display for LogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(message) => write!(f, "invalid log directory: {message}"),
            Self::CreateDirectory { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
            Self::AlreadyInitialized { active, requested } => write!(
                f,
                "logging already active as {active}; refusing {requested}"
            ),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FlexiLoggerError> for LogError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Validated logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    level: &'static str,
    dir: PathBuf,
}

impl LogConfig {
    /// # Errors
    /// - `InvalidLevel` for anything but trace|debug|info|warn|error.
    /// - `InvalidDirectory` when `dir` is empty or relative.
    pub fn new(level: &str, dir: impl AsRef<Path>) -> Result<Self, LogError> {
        Ok(Self {
            level: parse_level(level)?,
            dir: absolute_dir(dir.as_ref())?,
        })
    }

    /// Level from `UNITWORK_LOG_LEVEL`, or `default_log_level()` when unset.
    pub fn from_env(dir: impl AsRef<Path>) -> Result<Self, LogError> {
        match std::env::var(LOG_LEVEL_ENV) {
            Ok(level) if !level.trim().is_empty() => Self::new(&level, dir),
            _ => Self::new(default_log_level(), dir),
        }
    }

    pub fn level(&self) -> &'static str {
        self.level
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Display for LogConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "level={} dir={}", self.level, self.dir.display())
    }
}

/// Starts the process logger.
///
/// # Errors
/// - `CreateDirectory` / `Backend` when the file logger cannot start.
/// - `AlreadyInitialized` when a different config is already active.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let active = ACTIVE.get_or_try_init(|| start(config))?;
    if active.config != *config {
        return Err(LogError::AlreadyInitialized {
            active: active.config.clone(),
            requested: config.clone(),
        });
    }
    Ok(())
}

/// Config of the running logger, if `init_logging` succeeded.
pub fn active_config() -> Option<LogConfig> {
    ACTIVE.get().map(|active| active.config.clone())
}

/// Writes buffered lines to disk. No-op before `init_logging`.
pub fn flush_logs() {
    if let Some(active) = ACTIVE.get() {
        active.handle.flush();
    }
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(config: &LogConfig) -> Result<ActiveLogger, LogError> {
    std::fs::create_dir_all(&config.dir).map_err(|source| LogError::CreateDirectory {
        dir: config.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(config.level)?
        .log_to_file(
            FileSpec::default()
                .directory(config.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    info!(
        "event=logging_init module=logging status=ok {} version={}",
        config,
        env!("CARGO_PKG_VERSION")
    );
    Ok(ActiveLogger {
        config: config.clone(),
        handle,
    })
}

fn parse_level(level: &str) -> Result<&'static str, LogError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        _ => Err(LogError::InvalidLevel(level.trim().to_string())),
    }
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, LogError> {
    if dir.as_os_str().is_empty() {
        return Err(LogError::InvalidDirectory("path is empty".to_string()));
    }
    if !dir.is_absolute() {
        return Err(LogError::InvalidDirectory(format!(
            "`{}` is not absolute",
            dir.display()
        )));
    }
    Ok(dir.to_path_buf())
}
