//! Tests for the stream registry bookkeeping.

use super::*;
use crate::scheduler::op::{OpClass, OpState};

const STRICT: ReorderOptions = ReorderOptions::STRICTLY_ORDERED;

fn prio(v: u32) -> Priority {
    Priority::new(v).unwrap()
}

fn op(stream: u32, class: OpClass, tag: u32) -> StreamOp<u32> {
    StreamOp::new(stream, class, tag)
}

#[test]
fn open_rejects_duplicate_ids() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(3)).unwrap();
    assert_eq!(reg.open(1, prio(4)), Err(SchedulerError::AlreadyExists(1)));
    assert_eq!(reg.len(), 1);
}

#[test]
fn admit_to_unknown_stream_returns_op() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    let (op, err) = reg.admit(op(9, OpClass::Read, 77), STRICT).unwrap_err();
    assert_eq!(err, SchedulerError::NotFound(9));
    assert_eq!(op.payload, 77);
    assert_eq!(op.seq(), 0);
}

#[test]
fn first_admit_makes_stream_ready() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(3)).unwrap();
    assert!(reg.admit(op(1, OpClass::Write, 0), STRICT).unwrap());
    // Already ready: second admit does not re-insert.
    assert!(!reg.admit(op(1, OpClass::Write, 1), STRICT).unwrap());
    assert_eq!(reg.counts().ready_streams, 1);
    assert_eq!(reg.num_ready(), 1);
}

#[test]
fn admission_assigns_increasing_sequence_numbers() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(0)).unwrap();
    for tag in 0..3 {
        reg.admit(op(1, OpClass::Read, tag), STRICT).unwrap();
    }
    let mut last = 0;
    for _ in 0..3 {
        let op = reg.take_ready(STRICT).unwrap();
        assert!(op.seq() > last);
        last = op.seq();
        reg.finish(1, op.seq(), STRICT);
    }
}

#[test]
fn take_and_finish_track_outstanding() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(0)).unwrap();
    reg.admit(op(1, OpClass::Read, 0), STRICT).unwrap();
    reg.admit(op(1, OpClass::Read, 1), STRICT).unwrap();

    let first = reg.take_ready(STRICT).unwrap();
    assert_eq!(reg.outstanding(), 1);
    assert!(!reg.has_ready());
    assert!(reg.take_ready(STRICT).is_none());

    let done = reg.finish(1, first.seq(), STRICT);
    assert_eq!(done, Completion { made_ready: true, closed: false });
    assert_eq!(reg.outstanding(), 0);
    assert_eq!(reg.take_ready(STRICT).unwrap().payload, 1);
}

#[test]
fn close_empty_stream_removes_it() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(5, prio(1)).unwrap();
    assert_eq!(reg.close(5), Ok(StreamState::Closed));
    assert_eq!(reg.state_of(5), None);
    // Id is reusable once removed.
    reg.open(5, prio(2)).unwrap();
}

#[test]
fn closing_stream_drains_then_disappears() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(5, prio(1)).unwrap();
    reg.admit(op(5, OpClass::Write, 0), STRICT).unwrap();
    assert_eq!(reg.close(5), Ok(StreamState::Closing));
    assert!(matches!(reg.close(5), Err(SchedulerError::BadState(_))));

    let (rejected, err) = reg.admit(op(5, OpClass::Write, 1), STRICT).unwrap_err();
    assert_eq!(err, SchedulerError::NotFound(5));
    assert_eq!(rejected.payload, 1);

    let taken = reg.take_ready(STRICT).unwrap();
    assert_eq!(reg.state_of(5), Some(StreamState::Closing));
    let done = reg.finish(5, taken.seq(), STRICT);
    assert!(done.closed);
    assert_eq!(reg.state_of(5), None);
    assert!(reg.is_empty());
}

#[test]
fn close_unknown_stream() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    assert_eq!(reg.close(3), Err(SchedulerError::NotFound(3)));
}

#[test]
fn in_flight_op_cannot_be_admitted_again() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(0)).unwrap();
    reg.admit(op(1, OpClass::Read, 0), STRICT).unwrap();
    let mut taken = reg.take_ready(STRICT).unwrap();
    taken.advance(OpState::Acquired);
    let (_, err) = reg.admit(taken, STRICT).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidArgument(_)));
}

#[test]
#[should_panic(expected = "not in flight")]
fn double_finish_panics() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(0)).unwrap();
    reg.admit(op(1, OpClass::Read, 0), STRICT).unwrap();
    reg.admit(op(1, OpClass::Read, 1), STRICT).unwrap();
    let taken = reg.take_ready(STRICT).unwrap();
    reg.finish(1, taken.seq(), STRICT);
    reg.finish(1, taken.seq(), STRICT);
}

#[test]
fn close_all_returns_queued_ops() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(0)).unwrap();
    reg.open(2, prio(9)).unwrap();
    reg.admit(op(1, OpClass::Read, 10), STRICT).unwrap();
    reg.admit(op(2, OpClass::Write, 20), STRICT).unwrap();
    reg.admit(op(2, OpClass::Write, 21), STRICT).unwrap();

    let mut tags: Vec<u32> = reg.close_all().into_iter().map(|op| op.payload).collect();
    tags.sort_unstable();
    assert_eq!(tags, vec![10, 20, 21]);
    assert!(reg.is_empty());
    assert!(!reg.has_ready());
    assert_eq!(reg.counts().queued, 0);
}

#[test]
fn counts_split_open_and_closing() {
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(0)).unwrap();
    reg.open(2, prio(0)).unwrap();
    reg.admit(op(2, OpClass::Read, 0), STRICT).unwrap();
    reg.close(2).unwrap();

    let counts = reg.counts();
    assert_eq!(counts.open_streams, 1);
    assert_eq!(counts.closing_streams, 1);
    assert_eq!(counts.queued, 1);
    assert_eq!(counts.admitted_total, 1);
}

#[test]
fn large_backlog_behind_in_flight_write() {
    let opts = ReorderOptions::REORDER_READS;
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(4)).unwrap();
    reg.admit(op(1, OpClass::Write, 0), opts).unwrap();
    let head = reg.take_ready(opts).unwrap();

    let start = std::time::Instant::now();
    for tag in 1..=50_000 {
        assert!(!reg.admit(op(1, OpClass::Write, tag), opts).unwrap());
        assert_eq!(reg.num_ready(), 0);
    }
    // Each admit is constant work, so this stays far below a second.
    assert!(start.elapsed() < std::time::Duration::from_secs(5));
    assert!(reg.take_ready(opts).is_none());

    let done = reg.finish(1, head.seq(), opts);
    assert!(done.made_ready);
    assert_eq!(reg.num_ready(), 1);
    assert_eq!(reg.take_ready(opts).unwrap().payload, 1);
    assert_eq!(reg.num_ready(), 0);
}

#[test]
fn num_ready_follows_reads_in_flight() {
    let opts = ReorderOptions::REORDER_READS;
    let mut reg: StreamRegistry<u32> = StreamRegistry::new();
    reg.open(1, prio(0)).unwrap();
    reg.open(2, prio(0)).unwrap();
    for tag in 0..3 {
        reg.admit(op(1, OpClass::Read, tag), opts).unwrap();
    }
    reg.admit(op(1, OpClass::Write, 3), opts).unwrap();
    reg.admit(op(2, OpClass::Write, 4), opts).unwrap();
    assert_eq!(reg.num_ready(), 4);

    let taken: Vec<_> = std::iter::from_fn(|| reg.take_ready(opts)).collect();
    assert_eq!(taken.len(), 4);
    assert_eq!(reg.num_ready(), 0);

    // The write on stream 1 waits for all three reads.
    for read in taken.iter().filter(|op| op.stream_id() == 1) {
        assert_eq!(reg.num_ready(), 0);
        reg.finish(1, read.seq(), opts);
    }
    assert_eq!(reg.num_ready(), 1);
}
