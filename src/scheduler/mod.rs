//! Stream I/O scheduler.
//!
//! Ops are admitted into per-stream queues, picked by priority with
//! round robin inside a priority level, dispatched to worker threads under
//! per-stream reordering rules, and completed either inline or later from
//! any thread.

mod client;
mod coordinator;
mod dispatch;
mod error;
mod lifecycle;
mod op;
mod options;
mod pool;
mod priority;
mod registry;
mod stats;
mod stream;
mod worker;

pub use client::{IssueOutcome, SchedulerClient};
pub use coordinator::{Completer, Scheduler};
pub use dispatch::{EnqueueReport, FailedOp, Rejected};
pub use error::SchedulerError;
pub use lifecycle::Lifecycle;
pub use op::{OpClass, OpState, Status, StreamOp};
pub use options::ReorderOptions;
pub use pool::{WorkerPoolConfig, DEFAULT_STACK_SIZE};
pub use priority::{Priority, ReadySet};
pub use stats::SchedulerStats;
pub use stream::StreamState;
