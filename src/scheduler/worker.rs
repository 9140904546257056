//! Worker loop: dequeue an op, issue it through the client, feed the
//! completion back.

use std::sync::Arc;

use super::client::{IssueOutcome, SchedulerClient};
use super::dispatch::SchedulerCore;
use super::op::{OpState, Status};
use crate::telemetry::{OpSpan, SpanExt};

/// Run until `dequeue` reports shutdown or the client reports a fatal error.
pub(crate) fn run<P: Send + 'static>(
    worker_id: usize,
    core: Arc<SchedulerCore<P>>,
    client: Arc<dyn SchedulerClient<P>>,
) {
    tracing::debug!(worker_id, "worker started");
    loop {
        let mut op = match core.dequeue(true) {
            Ok(op) => op,
            Err(e) if e.is_transient() => continue,
            Err(e) => {
                tracing::debug!(worker_id, reason = %e, "worker exiting");
                break;
            }
        };

        op.advance(OpState::Issued);
        let span = OpSpan::new(op.stream_id(), op.seq(), op.class());
        let outcome = span.in_scope(|| client.issue(op));

        match outcome {
            IssueOutcome::Complete(op) => {
                span.record_status(op.result());
                core.complete(op);
            }
            IssueOutcome::Pending => {
                span.record_pending();
            }
            IssueOutcome::Fatal { mut op, reason } => {
                tracing::warn!(worker_id, seq = op.seq(), %reason, "client fatal error");
                if op.result().is_none() {
                    op.set_result(Status::INTERNAL);
                }
                span.record_status(op.result());
                core.complete(op);
                core.record_fatal(&reason);
                client.fatal(&reason);
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
