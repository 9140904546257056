//! Contract with the code that actually performs ops.

use super::op::StreamOp;

/// What a client did with an op handed to `issue`.
pub enum IssueOutcome<P> {
    /// Finished inline; the result is set and the op comes back.
    Complete(StreamOp<P>),
    /// The client kept the op and will finish it later through a `Completer`.
    Pending,
    /// Unrecoverable client failure. The worker completes the op, reports the
    /// reason and stops dequeuing.
    Fatal { op: StreamOp<P>, reason: String },
}

/// Implemented by the surrounding system; the scheduler never looks inside
/// an op payload.
///
/// None of these methods are called with the scheduler lock held, so they
/// may call back into the scheduler. They must not call `Scheduler::shutdown`.
pub trait SchedulerClient<P>: Send + Sync {
    /// Start the op. Runs on a worker thread.
    fn issue(&self, op: StreamOp<P>) -> IssueOutcome<P>;

    /// Take back a completed op. Called once per completion, from whichever
    /// thread reported it.
    fn release(&self, op: StreamOp<P>);

    /// Notification that a worker stopped on a fatal client error.
    fn fatal(&self, _reason: &str) {}
}
