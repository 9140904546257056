//! Runtime configuration loading from environment variables.
//!
//! All values come from `IOSCHED_*` environment variables with defaults.
//! Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `IOSCHED_WORKERS` | 0 | Worker threads (0 = available parallelism) |
//! | `IOSCHED_STACK_SIZE` | 262144 | Worker stack size (bytes, floor 64 KiB) |
//! | `IOSCHED_THREAD_PREFIX` | `iosched-worker` | Worker thread name prefix |
//! | `IOSCHED_REORDER` | 0 | Reorder bitmask (unknown bits = strict) |
//! | `IOSCHED_LOG_LEVEL` | `info` | Tracing filter directive |
//! | `IOSCHED_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `IOSCHED_LOG_FILE` | unset | Write JSON logs to this file |

use std::path::PathBuf;

use serde::Serialize;

use crate::scheduler::{ReorderOptions, WorkerPoolConfig, DEFAULT_STACK_SIZE};
use crate::telemetry::{LogConfig, LogFormat};

const MIN_STACK_SIZE: usize = 64 * 1024;

/// Effective runtime configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name_prefix: String,
    pub reorder_bits: u32,
    pub reorder: String,
    pub log_level: String,
    pub log_format: &'static str,
    pub log_file: Option<String>,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub workers: WorkerPoolConfig,
    pub reorder: ReorderOptions,
    pub log: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

fn load_worker_config() -> WorkerPoolConfig {
    let threads = parse_usize("IOSCHED_WORKERS", 0);
    let stack_size = parse_usize("IOSCHED_STACK_SIZE", DEFAULT_STACK_SIZE);
    let stack_size = stack_size.max(MIN_STACK_SIZE);
    let mut config = WorkerPoolConfig::with_threads(threads);
    config.stack_size = stack_size;
    if let Ok(prefix) = std::env::var("IOSCHED_THREAD_PREFIX") {
        let prefix = prefix.trim();
        if !prefix.is_empty() {
            config.thread_name_prefix = prefix.to_string();
        }
    }
    config
}

fn load_reorder() -> ReorderOptions {
    let bits = parse_u32("IOSCHED_REORDER", 0);
    ReorderOptions::from_bits(bits).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring IOSCHED_REORDER");
        ReorderOptions::STRICTLY_ORDERED
    })
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("IOSCHED_LOG_LEVEL")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("IOSCHED_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
        .unwrap_or(defaults.format);
    let output_path = std::env::var("IOSCHED_LOG_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    LogConfig { format, level, output_path }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        workers: load_worker_config(),
        reorder: load_reorder(),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            worker_threads: self.workers.worker_threads.get(),
            stack_size: self.workers.stack_size,
            thread_name_prefix: self.workers.thread_name_prefix.clone(),
            reorder_bits: self.reorder.bits(),
            reorder: self.reorder.to_string(),
            log_level: self.log.level.clone(),
            log_format: match self.log.format {
                LogFormat::Json => "json",
                LogFormat::Pretty => "pretty",
            },
            log_file: self
                .log
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}
