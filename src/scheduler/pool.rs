//! Worker pool configuration.

use std::num::NonZeroUsize;

/// Stack size used when none is configured.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Worker pool configuration, supplied to `Scheduler::serve`.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub worker_threads: NonZeroUsize,
    /// Stack size per thread in bytes.
    pub stack_size: usize,
    /// Thread name prefix; workers are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: auto_threads(),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name_prefix: "iosched-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    /// Create config with a specific thread count (0 means auto-detect).
    pub fn with_threads(count: usize) -> Self {
        Self {
            worker_threads: NonZeroUsize::new(count).unwrap_or_else(auto_threads),
            ..Default::default()
        }
    }
}

fn auto_threads() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}
