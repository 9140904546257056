//! Per-op span creation and outcome recording.

use tracing::{debug_span, Span};

use crate::scheduler::{OpClass, Status};

/// Extension trait for recording op outcomes into a span.
pub trait SpanExt {
    /// Record the final status of an op, or that it finished without one.
    fn record_status(&self, status: Option<Status>);

    /// Record that the client kept the op for asynchronous completion.
    fn record_pending(&self);
}

impl SpanExt for Span {
    fn record_status(&self, status: Option<Status>) {
        match status {
            Some(s) if s.is_ok() => {
                self.record("status", "ok");
            }
            Some(s) => {
                self.record("status", "error");
                self.record("error.code", s.0);
            }
            None => {
                self.record("status", "unset");
            }
        }
    }

    fn record_pending(&self) {
        self.record("status", "pending");
    }
}

/// Factory for the span wrapping one `SchedulerClient::issue` call.
pub struct OpSpan;

impl OpSpan {
    /// Fields: `stream_id`, `seq`, `class`, plus `status` and `error.code`
    /// filled in through `SpanExt`.
    pub fn new(stream_id: u32, seq: u64, class: OpClass) -> Span {
        debug_span!(
            "issue_op",
            stream_id,
            seq,
            class = ?class,
            status = tracing::field::Empty,
            error.code = tracing::field::Empty,
        )
    }
}
