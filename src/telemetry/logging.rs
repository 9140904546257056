//! Logging setup for processes embedding the scheduler.
//!
//! The scheduler only emits `tracing` events; installing a subscriber is
//! left to the host. `init_logging` is the stock way to do it.

use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogFormat {
    /// Parse `json` or `pretty`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// How the host wants scheduler events rendered. `config::load` fills this
/// from `IOSCHED_LOG_LEVEL`, `IOSCHED_LOG_FORMAT` and `IOSCHED_LOG_FILE`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive. `iosched_core=debug` shows stream open/close
    /// and drain events; `trace` adds every acquire and completion.
    pub level: String,
    /// JSON events go to this file, truncated on init. Ignored for `Pretty`.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

/// Why `init_logging` installed nothing.
#[derive(Debug, Error)]
pub enum LogError {
    /// `LogConfig::level` is not a valid filter directive.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Failed to create log file: {0}")]
    FileOpen(String),
    /// The host, or an earlier call, already set a global subscriber.
    #[error("Global subscriber already set")]
    AlreadyInitialized,
}

/// Install the global tracing subscriber. Fails if one is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::InvalidFilter(e.to_string()))?;

    match config.format {
        LogFormat::Json => init_json(filter, config.output_path.as_ref()),
        LogFormat::Pretty => init_pretty(filter),
    }
}

fn init_json(filter: EnvFilter, path: Option<&PathBuf>) -> Result<(), LogError> {
    let registry = tracing_subscriber::registry().with(filter);

    if let Some(path) = path {
        let file = std::fs::File::create(path).map_err(|e| LogError::FileOpen(e.to_string()))?;
        registry
            .with(fmt::layer().json().with_thread_names(true).with_writer(std::sync::Mutex::new(file)))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)
    } else {
        registry
            .with(fmt::layer().json().with_thread_names(true))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)
    }
}

fn init_pretty(filter: EnvFilter) -> Result<(), LogError> {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().pretty().with_thread_names(true))
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)
}
