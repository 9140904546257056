//! Per-stream queue and ordering policy.

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::Serialize;

use super::op::{OpClass, StreamOp};
use super::options::ReorderOptions;
use super::priority::Priority;

/// Stream lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    Open,
    /// No new ops admitted; queued and in-flight ops still drain.
    Closing,
    Closed,
}

/// Set of op classes an op would have to overtake.
#[derive(Debug, Clone, Copy, Default)]
struct Blockers {
    read: bool,
    write: bool,
    other: bool,
}

impl Blockers {
    fn insert(&mut self, class: OpClass) {
        match class {
            OpClass::Read => self.read = true,
            OpClass::Write => self.write = true,
            OpClass::Other => self.other = true,
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            read: self.read || other.read,
            write: self.write || other.write,
            other: self.other || other.other,
        }
    }

    fn passable_by(&self, class: OpClass, opts: ReorderOptions) -> bool {
        if self.other || (class == OpClass::Other && (self.read || self.write)) {
            return false;
        }
        (!self.read || opts.may_pass(class, OpClass::Read))
            && (!self.write || opts.may_pass(class, OpClass::Write))
    }

    /// None of the classes still waiting further back could overtake this
    /// set. Blockers only grow along the queue, so a scan can stop here.
    fn blocks_rest(&self, remaining: &[usize; 3], opts: ReorderOptions) -> bool {
        CLASSES
            .into_iter()
            .zip(remaining)
            .all(|(class, &left)| left == 0 || !self.passable_by(class, opts))
    }
}

fn class_slot(class: OpClass) -> usize {
    match class {
        OpClass::Read => 0,
        OpClass::Write => 1,
        OpClass::Other => 2,
    }
}

const CLASSES: [OpClass; 3] = [OpClass::Read, OpClass::Write, OpClass::Other];

/// Ops of one stream awaiting dispatch plus those dispatched but not completed.
pub struct Stream<P> {
    id: u32,
    priority: Priority,
    state: StreamState,
    queue: VecDeque<StreamOp<P>>,
    /// Queued ops per class.
    queued_by_class: [usize; 3],
    in_flight: HashMap<u64, OpClass>,
    /// In-flight seqs per class, so the oldest of each is at hand.
    in_flight_by_class: [BTreeSet<u64>; 3],
    /// Queued ops that could be dispatched right now.
    ready: usize,
    /// Whether the registry currently holds this stream in its ready set.
    pub(crate) in_ready: bool,
}

impl<P> Stream<P> {
    pub fn new(id: u32, priority: Priority) -> Self {
        Self {
            id,
            priority,
            state: StreamState::Open,
            queue: VecDeque::new(),
            queued_by_class: [0; 3],
            in_flight: HashMap::new(),
            in_flight_by_class: Default::default(),
            ready: 0,
            in_ready: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// No queued and no in-flight ops.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }

    pub fn begin_close(&mut self) {
        self.state = StreamState::Closing;
    }

    pub fn mark_closed(&mut self) {
        self.state = StreamState::Closed;
    }

    /// Append a freshly admitted op. Its seq is the largest on the stream,
    /// so everything queued or in flight is ahead of it.
    pub fn push(&mut self, op: StreamOp<P>, opts: ReorderOptions) {
        let mut blockers = Blockers::default();
        for (slot, class) in CLASSES.into_iter().enumerate() {
            if self.queued_by_class[slot] > 0 || !self.in_flight_by_class[slot].is_empty() {
                blockers.insert(class);
            }
        }
        if blockers.passable_by(op.class(), opts) {
            self.ready += 1;
        }
        self.queued_by_class[class_slot(op.class())] += 1;
        self.queue.push_back(op);
    }

    /// Classes of in-flight ops admitted before `seq`.
    fn in_flight_before(&self, seq: u64) -> Blockers {
        let mut blockers = Blockers::default();
        for (slot, class) in CLASSES.into_iter().enumerate() {
            if self.in_flight_by_class[slot].first().is_some_and(|&oldest| oldest < seq) {
                blockers.insert(class);
            }
        }
        blockers
    }

    /// Queue index of the first op that may overtake every earlier op,
    /// whether still queued or in flight.
    fn next_dispatchable(&self, opts: ReorderOptions) -> Option<usize> {
        if self.ready == 0 {
            return None;
        }
        let mut queued = Blockers::default();
        let mut remaining = self.queued_by_class;
        for (idx, op) in self.queue.iter().enumerate() {
            let blockers = queued.union(self.in_flight_before(op.seq()));
            if blockers.passable_by(op.class(), opts) {
                return Some(idx);
            }
            if blockers.blocks_rest(&remaining, opts) {
                return None;
            }
            remaining[class_slot(op.class())] -= 1;
            queued.insert(op.class());
        }
        None
    }

    /// Walk the queue and count dispatchable ops, stopping once nothing
    /// further back could pass.
    fn count_dispatchable(&self, opts: ReorderOptions) -> usize {
        let mut queued = Blockers::default();
        let mut remaining = self.queued_by_class;
        let mut count = 0;
        for op in &self.queue {
            let blockers = queued.union(self.in_flight_before(op.seq()));
            if blockers.passable_by(op.class(), opts) {
                count += 1;
            } else if blockers.blocks_rest(&remaining, opts) {
                break;
            }
            remaining[class_slot(op.class())] -= 1;
            queued.insert(op.class());
        }
        count
    }

    pub fn has_dispatchable(&self) -> bool {
        self.ready > 0
    }

    /// Number of queued ops that could be dispatched right now.
    pub fn dispatchable_count(&self) -> usize {
        self.ready
    }

    /// Remove the next dispatchable op and record it as in flight.
    ///
    /// The op keeps its seq, so it blocks later ops exactly as it did while
    /// queued and the ready count only loses this op.
    pub fn take_next(&mut self, opts: ReorderOptions) -> Option<StreamOp<P>> {
        let idx = self.next_dispatchable(opts)?;
        let op = self.queue.remove(idx)?;
        let slot = class_slot(op.class());
        self.queued_by_class[slot] -= 1;
        self.in_flight.insert(op.seq(), op.class());
        self.in_flight_by_class[slot].insert(op.seq());
        self.ready -= 1;
        Some(op)
    }

    /// Forget an in-flight op. Returns false if `seq` was not in flight.
    pub fn finish(&mut self, seq: u64, opts: ReorderOptions) -> bool {
        let Some(class) = self.in_flight.remove(&seq) else {
            return false;
        };
        self.in_flight_by_class[class_slot(class)].remove(&seq);
        if self.ready < self.queue.len() {
            self.ready = self.count_dispatchable(opts);
        }
        true
    }

    /// Remove every queued op, leaving in-flight bookkeeping untouched.
    pub fn drain_queue(&mut self) -> impl Iterator<Item = StreamOp<P>> + '_ {
        self.queued_by_class = [0; 3];
        self.ready = 0;
        self.queue.drain(..)
    }
}
