//! Stream registry: arena, id index, ready set and op counters.
//!
//! Every method assumes the caller holds the scheduler lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use slab::Slab;

use super::error::SchedulerError;
use super::op::StreamOp;
use super::options::ReorderOptions;
use super::priority::{Priority, ReadySet};
use super::stream::{Stream, StreamState};

/// Process-wide op sequence numbers. Zero is reserved for "never admitted".
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_seq() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Bookkeeping effect of one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The stream re-entered the ready set.
    pub made_ready: bool,
    /// The stream was closing and has now been removed.
    pub closed: bool,
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryCounts {
    pub open_streams: usize,
    pub closing_streams: usize,
    pub ready_streams: usize,
    pub queued: usize,
    pub outstanding: usize,
    pub admitted_total: u64,
    pub dispatched_total: u64,
    pub completed_total: u64,
}

pub struct StreamRegistry<P> {
    streams: Slab<Stream<P>>,
    by_id: BTreeMap<u32, usize>,
    ready: ReadySet,
    /// Acquired but not yet completed, across all streams.
    outstanding: usize,
    queued: usize,
    /// Sum of every stream's dispatchable count.
    dispatchable: usize,
    admitted_total: u64,
    dispatched_total: u64,
    completed_total: u64,
}

impl<P> StreamRegistry<P> {
    pub fn new() -> Self {
        Self {
            streams: Slab::new(),
            by_id: BTreeMap::new(),
            ready: ReadySet::new(),
            outstanding: 0,
            queued: 0,
            dispatchable: 0,
            admitted_total: 0,
            dispatched_total: 0,
            completed_total: 0,
        }
    }

    pub fn open(&mut self, id: u32, priority: Priority) -> Result<(), SchedulerError> {
        if self.by_id.contains_key(&id) {
            return Err(SchedulerError::AlreadyExists(id));
        }
        let handle = self.streams.insert(Stream::new(id, priority));
        self.by_id.insert(id, handle);
        Ok(())
    }

    /// Begin closing a stream. Returns the resulting state: `Closed` when the
    /// stream had nothing left and was removed right away.
    pub fn close(&mut self, id: u32) -> Result<StreamState, SchedulerError> {
        let handle = *self.by_id.get(&id).ok_or(SchedulerError::NotFound(id))?;
        let stream = &mut self.streams[handle];
        if stream.state() != StreamState::Open {
            return Err(SchedulerError::BadState(format!("stream {id} already closing")));
        }
        stream.begin_close();
        if stream.is_drained() {
            self.remove(handle);
            return Ok(StreamState::Closed);
        }
        tracing::debug!(
            stream_id = id,
            queued = stream.queued(),
            in_flight = stream.in_flight(),
            "stream draining before close"
        );
        Ok(StreamState::Closing)
    }

    fn remove(&mut self, handle: usize) {
        let mut stream = self.streams.remove(handle);
        if stream.in_ready {
            self.ready.remove(handle, stream.priority());
        }
        stream.mark_closed();
        self.by_id.remove(&stream.id());
    }

    pub fn state_of(&self, id: u32) -> Option<StreamState> {
        self.by_id.get(&id).map(|&h| self.streams[h].state())
    }

    /// Admit one op into its stream. Returns whether the stream became ready.
    /// On failure the op is handed back untouched.
    #[allow(clippy::result_large_err)]
    pub fn admit(
        &mut self,
        mut op: StreamOp<P>,
        opts: ReorderOptions,
    ) -> Result<bool, (StreamOp<P>, SchedulerError)> {
        let id = op.stream_id();
        let Some(&handle) = self.by_id.get(&id) else {
            return Err((op, SchedulerError::NotFound(id)));
        };
        if self.streams[handle].state() != StreamState::Open {
            return Err((op, SchedulerError::NotFound(id)));
        }
        if op.in_flight() {
            let err = SchedulerError::InvalidArgument(format!(
                "op {} is still in flight",
                op.seq()
            ));
            return Err((op, err));
        }

        op.admit(next_seq());
        let stream = &mut self.streams[handle];
        let before = stream.dispatchable_count();
        stream.push(op, opts);
        self.dispatchable += stream.dispatchable_count() - before;
        self.queued += 1;
        self.admitted_total += 1;

        if !stream.in_ready && stream.has_dispatchable() {
            stream.in_ready = true;
            self.ready.push(handle, stream.priority());
            return Ok(true);
        }
        Ok(false)
    }

    /// Pop the next op from the highest-priority, least recently served
    /// ready stream. The stream goes back to the tail of its partition if it
    /// still has a dispatchable op.
    pub fn take_ready(&mut self, opts: ReorderOptions) -> Option<StreamOp<P>> {
        while let Some(handle) = self.ready.pop_highest() {
            let stream = &mut self.streams[handle];
            stream.in_ready = false;
            let Some(op) = stream.take_next(opts) else {
                debug_assert!(false, "stream {} in ready set without work", stream.id());
                continue;
            };
            if stream.has_dispatchable() {
                stream.in_ready = true;
                self.ready.push(handle, stream.priority());
            }
            self.dispatchable -= 1;
            self.queued -= 1;
            self.outstanding += 1;
            self.dispatched_total += 1;
            return Some(op);
        }
        None
    }

    /// Record completion of an in-flight op.
    ///
    /// # Panics
    ///
    /// If the stream is unknown or `seq` is not in flight on it: the op was
    /// completed twice or never dispatched by this scheduler.
    pub fn finish(&mut self, stream_id: u32, seq: u64, opts: ReorderOptions) -> Completion {
        let Some(&handle) = self.by_id.get(&stream_id) else {
            panic!("completion of op {seq} for unknown stream {stream_id}");
        };
        let stream = &mut self.streams[handle];
        let before = stream.dispatchable_count();
        if !stream.finish(seq, opts) {
            panic!("op {seq} is not in flight on stream {stream_id}");
        }
        // Finishing only removes blockers, so the count never shrinks.
        self.dispatchable += stream.dispatchable_count() - before;
        self.outstanding -= 1;
        self.completed_total += 1;

        if stream.state() == StreamState::Closing && stream.is_drained() {
            self.remove(handle);
            return Completion { made_ready: false, closed: true };
        }
        if !stream.in_ready && stream.has_dispatchable() {
            stream.in_ready = true;
            self.ready.push(handle, stream.priority());
            return Completion { made_ready: true, closed: false };
        }
        Completion { made_ready: false, closed: false }
    }

    /// Ops dispatchable right now across every stream.
    pub fn num_ready(&self) -> usize {
        self.dispatchable
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Close and remove every stream, returning the ops still queued.
    ///
    /// Only valid once nothing is outstanding.
    pub fn close_all(&mut self) -> Vec<StreamOp<P>> {
        debug_assert_eq!(self.outstanding, 0, "close_all with ops in flight");
        let mut leftovers = Vec::with_capacity(self.queued);
        for mut stream in self.streams.drain() {
            leftovers.extend(stream.drain_queue());
            stream.mark_closed();
        }
        self.by_id.clear();
        self.ready.clear();
        self.queued = 0;
        self.dispatchable = 0;
        leftovers
    }

    pub fn counts(&self) -> RegistryCounts {
        let closing = self
            .streams
            .iter()
            .filter(|(_, s)| s.state() == StreamState::Closing)
            .count();
        RegistryCounts {
            open_streams: self.streams.len() - closing,
            closing_streams: closing,
            ready_streams: self.ready.len(),
            queued: self.queued,
            outstanding: self.outstanding,
            admitted_total: self.admitted_total,
            dispatched_total: self.dispatched_total,
            completed_total: self.completed_total,
        }
    }
}

impl<P> Default for StreamRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
