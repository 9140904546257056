//! Schedulable ops and their lifecycle.

use std::fmt;

/// Ordering class of an op, consulted by `ReorderOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Read,
    Write,
    /// Anything else. Never reordered against any other op.
    Other,
}

/// Lifecycle of one admission. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OpState {
    Unscheduled,
    Acquired,
    Issued,
    Completed,
}

/// Opaque client status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Self = Self(0);
    /// Set by a worker when a client reports a fatal error without a result.
    pub const INTERNAL: Self = Self(-1);
    /// Set by the scheduler on ops still queued when shutdown cancels them.
    pub const CANCELED: Self = Self(-23);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OK => write!(f, "ok"),
            Self::CANCELED => write!(f, "canceled"),
            Self::INTERNAL => write!(f, "internal"),
            Self(code) => write!(f, "status {code}"),
        }
    }
}

/// One unit of schedulable work.
///
/// Ownership moves with the value: producer → scheduler queue → worker →
/// client → scheduler → client `release`.
pub struct StreamOp<P> {
    seq: u64,
    stream_id: u32,
    class: OpClass,
    state: OpState,
    result: Option<Status>,
    pub payload: P,
}

impl<P> fmt::Debug for StreamOp<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOp")
            .field("seq", &self.seq)
            .field("stream_id", &self.stream_id)
            .field("class", &self.class)
            .field("state", &self.state)
            .field("result", &self.result)
            .finish()
    }
}

impl<P> StreamOp<P> {
    pub fn new(stream_id: u32, class: OpClass, payload: P) -> Self {
        Self {
            seq: 0,
            stream_id,
            class,
            state: OpState::Unscheduled,
            result: None,
            payload,
        }
    }

    /// Sequence number assigned at admission. Zero until first admitted.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn class(&self) -> OpClass {
        self.class
    }

    pub fn state(&self) -> OpState {
        self.state
    }

    pub fn result(&self) -> Option<Status> {
        self.result
    }

    /// Record the client's result. Must happen before completion.
    ///
    /// # Panics
    ///
    /// If the op is already completed.
    pub fn set_result(&mut self, status: Status) {
        assert!(
            self.state != OpState::Completed,
            "result written on completed op {}",
            self.seq
        );
        self.result = Some(status);
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// True while a worker or client holds the op between dequeue and completion.
    pub(crate) fn in_flight(&self) -> bool {
        matches!(self.state, OpState::Acquired | OpState::Issued)
    }

    pub(crate) fn admit(&mut self, seq: u64) {
        self.seq = seq;
        self.state = OpState::Unscheduled;
        self.result = None;
    }

    pub(crate) fn advance(&mut self, next: OpState) {
        assert!(
            next > self.state,
            "op {} cannot move from {:?} to {:?}",
            self.seq,
            self.state,
            next
        );
        self.state = next;
    }
}
