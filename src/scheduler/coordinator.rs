//! Public scheduler handle.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::client::SchedulerClient;
use super::dispatch::{EnqueueReport, Rejected, SchedulerCore};
use super::error::SchedulerError;
use super::lifecycle::Lifecycle;
use super::op::StreamOp;
use super::options::ReorderOptions;
use super::pool::WorkerPoolConfig;
use super::stats::SchedulerStats;
use super::stream::StreamState;
use super::worker;

/// Coordinates streams, ops and the worker pool.
///
/// Lifecycle: `init` → `serve` (optional) → `shutdown`, after which `init`
/// may be called again.
pub struct Scheduler<P> {
    core: Arc<SchedulerCore<P>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<P: Send + 'static> Scheduler<P> {
    pub fn new() -> Self {
        Self {
            core: Arc::new(SchedulerCore::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Attach a client and fix the reorder options until the next shutdown.
    pub fn init(
        &self,
        client: Arc<dyn SchedulerClient<P>>,
        options: ReorderOptions,
    ) -> Result<(), SchedulerError> {
        let mut inner = self.core.inner.lock();
        if inner.lifecycle != Lifecycle::Idle {
            return Err(SchedulerError::BadState(format!(
                "init while {}",
                inner.lifecycle
            )));
        }
        *self.core.client.write() = Some(client);
        *self.core.fatal.lock() = None;
        inner.options = options;
        inner.lifecycle = Lifecycle::Ready;
        tracing::info!(options = %options, "scheduler initialized");
        Ok(())
    }

    /// Spawn the worker pool.
    pub fn serve(&self, config: &WorkerPoolConfig) -> Result<(), SchedulerError> {
        let client = {
            let mut inner = self.core.inner.lock();
            if inner.lifecycle != Lifecycle::Ready {
                return Err(SchedulerError::BadState(format!(
                    "serve while {}",
                    inner.lifecycle
                )));
            }
            let client = self.core.client.read().clone().ok_or_else(|| {
                SchedulerError::BadState("no client attached".into())
            })?;
            inner.lifecycle = Lifecycle::Serving;
            client
        };

        let mut workers = self.workers.lock();
        for id in 0..config.worker_threads.get() {
            let core = Arc::clone(&self.core);
            let client = Arc::clone(&client);
            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if config.stack_size > 0 {
                builder = builder.stack_size(config.stack_size);
            }
            let handle = builder
                .spawn(move || worker::run(id, core, client))
                .map_err(|e| SchedulerError::Spawn(e.to_string()))?;
            workers.push(handle);
        }
        tracing::info!(workers = workers.len(), "worker pool started");
        Ok(())
    }

    /// Stop admitting work, wait for every worker to exit and every in-flight
    /// op to complete, then close all streams.
    ///
    /// Ops still queued at that point (no worker ever ran, or all of them
    /// stopped on fatal errors) are released to the client with
    /// `Status::CANCELED`. Must not be called from a client callback.
    pub fn shutdown(&self) -> Result<(), SchedulerError> {
        {
            let mut inner = self.core.inner.lock();
            if !inner.lifecycle.is_accepting() {
                return Err(SchedulerError::BadState(format!(
                    "shutdown while {}",
                    inner.lifecycle
                )));
            }
            inner.lifecycle = Lifecycle::Draining;
        }
        self.core.ready_cv.notify_all();
        tracing::info!("scheduler draining");

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }

        let leftovers = self.core.drain();
        let client = self.core.client.write().take();
        if !leftovers.is_empty() {
            tracing::warn!(count = leftovers.len(), "canceling ops never dispatched");
        }
        if let Some(client) = client {
            for op in leftovers {
                client.release(op);
            }
        }

        {
            let mut inner = self.core.inner.lock();
            inner.lifecycle = Lifecycle::Idle;
            inner.options = ReorderOptions::STRICTLY_ORDERED;
        }
        self.core.ready_cv.notify_all();
        tracing::info!("scheduler shut down");
        Ok(())
    }

    /// Register a stream. `priority` must be in `[0, 31]`.
    pub fn stream_open(&self, id: u32, priority: u32) -> Result<(), SchedulerError> {
        self.core.stream_open(id, priority)
    }

    /// Stop admitting ops to a stream. Queued and in-flight ops still drain;
    /// the stream is removed once empty. Returns the state after the call.
    pub fn stream_close(&self, id: u32) -> Result<StreamState, SchedulerError> {
        self.core.stream_close(id)
    }

    /// Admit a batch of ops. Per-op refusals come back in `failed`; a refused
    /// batch returns every op inside `Rejected`.
    pub fn enqueue(&self, ops: Vec<StreamOp<P>>) -> Result<EnqueueReport<P>, Rejected<P>> {
        self.core.enqueue(ops)
    }

    /// Take the next dispatchable op. With `wait`, block until one is ready
    /// or shutdown has drained.
    pub fn dequeue(&self, wait: bool) -> Result<StreamOp<P>, SchedulerError> {
        self.core.dequeue(wait)
    }

    /// Report completion of a dequeued op. Never blocks beyond the registry
    /// lock; safe to call from inside `SchedulerClient::issue`.
    ///
    /// # Panics
    ///
    /// If the op is not in flight here, e.g. on a second completion.
    pub fn async_complete(&self, op: StreamOp<P>) {
        self.core.complete(op)
    }

    /// Handle for completing ops from threads that do not own the scheduler.
    ///
    /// The handle does not keep the scheduler alive, so a client may store
    /// one without forming a cycle through `init`.
    pub fn completer(&self) -> Completer<P> {
        Completer { core: Arc::downgrade(&self.core) }
    }

    pub fn num_ready(&self) -> usize {
        let inner = self.core.inner.lock();
        inner.registry.num_ready()
    }

    pub fn outstanding(&self) -> usize {
        self.core.inner.lock().registry.outstanding()
    }

    /// State of a registered stream. `None` once closed and removed.
    pub fn stream_state(&self, id: u32) -> Option<StreamState> {
        self.core.inner.lock().registry.state_of(id)
    }

    pub fn stream_count(&self) -> usize {
        self.core.inner.lock().registry.len()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.core.lifecycle()
    }

    /// Reason given by the last client fatal error since `init`.
    pub fn fatal_error(&self) -> Option<String> {
        self.core.fatal.lock().clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        let (lifecycle, options) = {
            let inner = self.core.inner.lock();
            (inner.lifecycle, inner.options)
        };
        let workers = self.workers.lock().len();
        SchedulerStats::new(lifecycle, options, workers, self.core.counts())
    }
}

impl<P: Send + 'static> Default for Scheduler<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Drop for Scheduler<P> {
    fn drop(&mut self) {
        // Signal only: workers exit on their own once in-flight ops drain,
        // and the last of them frees the core along with the client.
        let mut inner = self.core.inner.lock();
        if inner.lifecycle.is_accepting() {
            inner.lifecycle = Lifecycle::Draining;
            drop(inner);
            self.core.ready_cv.notify_all();
        }
    }
}

/// Cloneable completion handle for asynchronous clients.
///
/// Holds a weak reference: while any op is outstanding a worker or the
/// `Scheduler` itself keeps the core alive.
pub struct Completer<P> {
    core: Weak<SchedulerCore<P>>,
}

impl<P> Clone for Completer<P> {
    fn clone(&self) -> Self {
        Self { core: Weak::clone(&self.core) }
    }
}

impl<P: Send + 'static> Completer<P> {
    /// Same as `Scheduler::async_complete`.
    ///
    /// # Panics
    ///
    /// If the op is not in flight, including when its scheduler has already
    /// been dropped.
    pub fn complete(&self, op: StreamOp<P>) {
        match self.core.upgrade() {
            Some(core) => core.complete(op),
            None => panic!("op {} completed after its scheduler was dropped", op.seq()),
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
