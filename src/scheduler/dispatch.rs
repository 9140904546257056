//! Shared scheduler state and the admission/dispatch/completion paths.
//!
//! A single mutex guards the registry and the lifecycle. `ready_cv` wakes
//! threads blocked in `dequeue`; `idle_cv` wakes `shutdown` once the last
//! outstanding op completes and has been released. The client is never
//! called with the lock held.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use super::client::SchedulerClient;
use super::error::SchedulerError;
use super::lifecycle::Lifecycle;
use super::op::{OpState, Status, StreamOp};
use super::options::ReorderOptions;
use super::priority::Priority;
use super::registry::{RegistryCounts, StreamRegistry};
use super::stream::StreamState;

/// Op refused at admission, with the reason. The op is untouched.
pub struct FailedOp<P> {
    pub op: StreamOp<P>,
    pub error: SchedulerError,
}

impl<P> std::fmt::Debug for FailedOp<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailedOp")
            .field("op", &self.op)
            .field("error", &self.error)
            .finish()
    }
}

/// Result of an accepted `enqueue` batch.
pub struct EnqueueReport<P> {
    /// Ops that were not admitted. Ownership is back with the caller.
    pub failed: Vec<FailedOp<P>>,
    /// Ops dispatchable across all streams after this batch.
    pub num_ready: usize,
}

impl<P> std::fmt::Debug for EnqueueReport<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnqueueReport")
            .field("failed", &self.failed)
            .field("num_ready", &self.num_ready)
            .finish()
    }
}

/// A whole batch refused before any op was looked at.
pub struct Rejected<P> {
    pub error: SchedulerError,
    pub ops: Vec<StreamOp<P>>,
}

impl<P> std::fmt::Debug for Rejected<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("ops", &self.ops.len())
            .finish()
    }
}

pub(crate) struct Inner<P> {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) options: ReorderOptions,
    pub(crate) registry: StreamRegistry<P>,
    /// Completions finalized in the registry whose `release` call is still running.
    pub(crate) releasing: usize,
}

/// Why a lifecycle refuses new streams and ops.
fn refusal(lifecycle: Lifecycle) -> SchedulerError {
    match lifecycle {
        Lifecycle::Draining => SchedulerError::Canceled,
        _ => SchedulerError::BadState("scheduler not initialized".into()),
    }
}

impl<P> Inner<P> {
    fn is_quiescent(&self) -> bool {
        self.registry.outstanding() == 0 && self.releasing == 0
    }
}

pub(crate) struct SchedulerCore<P> {
    pub(crate) inner: Mutex<Inner<P>>,
    pub(crate) ready_cv: Condvar,
    pub(crate) idle_cv: Condvar,
    pub(crate) client: RwLock<Option<Arc<dyn SchedulerClient<P>>>>,
    pub(crate) fatal: Mutex<Option<String>>,
}

impl<P: Send + 'static> SchedulerCore<P> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::Idle,
                options: ReorderOptions::STRICTLY_ORDERED,
                registry: StreamRegistry::new(),
                releasing: 0,
            }),
            ready_cv: Condvar::new(),
            idle_cv: Condvar::new(),
            client: RwLock::new(None),
            fatal: Mutex::new(None),
        }
    }

    pub(crate) fn stream_open(&self, id: u32, priority: u32) -> Result<(), SchedulerError> {
        let priority = Priority::new(priority)?;
        let mut inner = self.inner.lock();
        if !inner.lifecycle.is_accepting() {
            return Err(refusal(inner.lifecycle));
        }
        inner.registry.open(id, priority)?;
        tracing::debug!(stream_id = id, priority = priority.get(), "stream opened");
        Ok(())
    }

    pub(crate) fn stream_close(&self, id: u32) -> Result<StreamState, SchedulerError> {
        let mut inner = self.inner.lock();
        let state = inner.registry.close(id)?;
        tracing::debug!(stream_id = id, state = ?state, "stream closing");
        Ok(state)
    }

    pub(crate) fn enqueue(&self, ops: Vec<StreamOp<P>>) -> Result<EnqueueReport<P>, Rejected<P>> {
        if ops.is_empty() {
            let error = SchedulerError::InvalidArgument("empty enqueue batch".into());
            return Err(Rejected { error, ops });
        }

        let mut inner = self.inner.lock();
        if !inner.lifecycle.is_accepting() {
            return Err(Rejected { error: refusal(inner.lifecycle), ops });
        }

        let opts = inner.options;
        let mut failed = Vec::new();
        let mut woken = 0usize;
        for op in ops {
            match inner.registry.admit(op, opts) {
                Ok(true) => woken += 1,
                Ok(false) => {}
                Err((op, error)) => failed.push(FailedOp { op, error }),
            }
        }
        let num_ready = inner.registry.num_ready();
        drop(inner);

        for _ in 0..woken {
            self.ready_cv.notify_one();
        }
        if !failed.is_empty() {
            tracing::debug!(failed = failed.len(), "enqueue refused ops");
        }
        Ok(EnqueueReport { failed, num_ready })
    }

    pub(crate) fn dequeue(&self, wait: bool) -> Result<StreamOp<P>, SchedulerError> {
        let mut inner = self.inner.lock();
        loop {
            if inner.lifecycle == Lifecycle::Idle {
                return Err(SchedulerError::Canceled);
            }
            let opts = inner.options;
            if let Some(mut op) = inner.registry.take_ready(opts) {
                op.advance(OpState::Acquired);
                let more = inner.registry.has_ready();
                drop(inner);
                if more {
                    self.ready_cv.notify_one();
                }
                tracing::trace!(stream_id = op.stream_id(), seq = op.seq(), "op acquired");
                return Ok(op);
            }
            if inner.lifecycle.is_draining() && inner.registry.outstanding() == 0 {
                return Err(SchedulerError::Canceled);
            }
            if !wait {
                return Err(SchedulerError::ShouldWait);
            }
            self.ready_cv.wait(&mut inner);
        }
    }

    /// Finalize an op and hand it back to the client.
    ///
    /// # Panics
    ///
    /// If the op is not in flight on this scheduler (e.g. completed twice)
    /// or carries no result.
    pub(crate) fn complete(&self, mut op: StreamOp<P>) {
        assert!(
            op.in_flight(),
            "op {} completed in state {:?}",
            op.seq(),
            op.state()
        );
        assert!(op.result().is_some(), "op {} completed without a result", op.seq());

        let client = self.client.read().clone();
        op.advance(OpState::Completed);

        let mut inner = self.inner.lock();
        let opts = inner.options;
        let done = inner.registry.finish(op.stream_id(), op.seq(), opts);
        inner.releasing += 1;
        let drained = inner.lifecycle.is_draining() && inner.registry.outstanding() == 0;
        drop(inner);

        if done.made_ready {
            self.ready_cv.notify_one();
        }
        if drained {
            self.ready_cv.notify_all();
        }
        if done.closed {
            tracing::debug!(stream_id = op.stream_id(), "stream closed");
        }
        tracing::trace!(seq = op.seq(), status = ?op.result(), "op completed");

        match client {
            Some(client) => client.release(op),
            None => tracing::warn!(seq = op.seq(), "completed op dropped: no client"),
        }

        let mut inner = self.inner.lock();
        inner.releasing -= 1;
        let idle = inner.lifecycle.is_draining() && inner.is_quiescent();
        drop(inner);
        if idle {
            self.idle_cv.notify_all();
        }
    }

    /// Block until nothing is outstanding and every completed op has been
    /// released, then close every stream and return the ops that never got
    /// dispatched, already marked canceled.
    pub(crate) fn drain(&self) -> Vec<StreamOp<P>> {
        let mut inner = self.inner.lock();
        while !inner.is_quiescent() {
            self.idle_cv.wait(&mut inner);
        }
        let mut leftovers = inner.registry.close_all();
        drop(inner);

        for op in &mut leftovers {
            op.set_result(Status::CANCELED);
            op.advance(OpState::Completed);
        }
        leftovers
    }

    pub(crate) fn record_fatal(&self, reason: &str) {
        *self.fatal.lock() = Some(reason.to_string());
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.inner.lock().lifecycle
    }

    pub(crate) fn counts(&self) -> RegistryCounts {
        self.inner.lock().registry.counts()
    }
}
