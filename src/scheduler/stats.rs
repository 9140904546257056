//! Scheduler statistics snapshot.

use serde::Serialize;

use super::lifecycle::Lifecycle;
use super::options::ReorderOptions;
use super::registry::RegistryCounts;

/// Point-in-time view of the scheduler, cheap to take and serializable.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub lifecycle: Lifecycle,
    pub reorder_bits: u32,
    pub workers: usize,
    pub open_streams: usize,
    pub closing_streams: usize,
    pub ready_streams: usize,
    pub queued_ops: usize,
    pub outstanding_ops: usize,
    pub admitted_total: u64,
    pub dispatched_total: u64,
    pub completed_total: u64,
}

impl SchedulerStats {
    pub(crate) fn new(
        lifecycle: Lifecycle,
        options: ReorderOptions,
        workers: usize,
        counts: RegistryCounts,
    ) -> Self {
        Self {
            lifecycle,
            reorder_bits: options.bits(),
            workers,
            open_streams: counts.open_streams,
            closing_streams: counts.closing_streams,
            ready_streams: counts.ready_streams,
            queued_ops: counts.queued,
            outstanding_ops: counts.outstanding,
            admitted_total: counts.admitted_total,
            dispatched_total: counts.dispatched_total,
            completed_total: counts.completed_total,
        }
    }

    /// No queued or in-flight ops.
    pub fn is_idle(&self) -> bool {
        self.queued_ops == 0 && self.outstanding_ops == 0
    }
}
