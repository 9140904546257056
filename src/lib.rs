//! Stream I/O scheduler core.
//!
//! Producers open streams, each with a priority in `[0, 31]`, and enqueue
//! ops tagged with a stream id and an ordering class. A pool of worker
//! threads dequeues ops and hands them to a [`SchedulerClient`], which
//! completes them inline or later from any thread.
//!
//! # Guarantees
//!
//! - **Priority**: a ready stream of higher priority is always served before
//!   one of lower priority.
//! - **Fairness**: streams of equal priority are served round robin.
//! - **Ordering**: within one stream, ops run in admission order, one at a
//!   time, unless [`ReorderOptions`] relax it for specific class pairs.
//! - **Drain**: `shutdown` refuses new work, waits for every in-flight op and
//!   closes every stream. It never aborts an issued op.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use iosched_core::{
//!     IssueOutcome, OpClass, ReorderOptions, Scheduler, SchedulerClient, Status, StreamOp,
//!     WorkerPoolConfig,
//! };
//!
//! struct Inline;
//!
//! impl SchedulerClient<u64> for Inline {
//!     fn issue(&self, mut op: StreamOp<u64>) -> IssueOutcome<u64> {
//!         op.payload *= 2;
//!         op.set_result(Status::OK);
//!         IssueOutcome::Complete(op)
//!     }
//!
//!     fn release(&self, op: StreamOp<u64>) {
//!         assert_eq!(op.result(), Some(Status::OK));
//!     }
//! }
//!
//! let scheduler: Scheduler<u64> = Scheduler::new();
//! scheduler.init(Arc::new(Inline), ReorderOptions::STRICTLY_ORDERED).unwrap();
//! scheduler.stream_open(1, 10).unwrap();
//! scheduler.enqueue(vec![StreamOp::new(1, OpClass::Write, 21)]).unwrap();
//! scheduler.serve(&WorkerPoolConfig::with_threads(2)).unwrap();
//! scheduler.shutdown().unwrap();
//! assert_eq!(scheduler.outstanding(), 0);
//! ```

pub mod config;
pub mod scheduler;
pub mod telemetry;

pub use scheduler::{
    Completer, EnqueueReport, FailedOp, IssueOutcome, Lifecycle, OpClass, OpState, Priority,
    Rejected, ReorderOptions, Scheduler, SchedulerClient, SchedulerError, SchedulerStats, Status,
    StreamOp, StreamState, WorkerPoolConfig,
};
