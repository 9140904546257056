//! Fuzz target for arbitrary open/close/enqueue/dequeue/complete sequences.
//!
//! Drives the scheduler by hand and checks that every admitted op is
//! released exactly once by the end of shutdown.

#![no_main]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbitrary::Arbitrary;
use iosched_core::{
    IssueOutcome, OpClass, ReorderOptions, Scheduler, SchedulerClient, Status, StreamOp,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Action {
    Open { stream: u8, priority: u8 },
    Close { stream: u8 },
    Enqueue { stream: u8, class: u8, count: u8 },
    Dequeue,
    Complete { index: u8, status: i8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    reorder: u8,
    actions: Vec<Action>,
}

#[derive(Default)]
struct Counter {
    released: AtomicUsize,
}

impl SchedulerClient<u32> for Counter {
    fn issue(&self, op: StreamOp<u32>) -> IssueOutcome<u32> {
        IssueOutcome::Fatal { op, reason: "manual dispatch only".into() }
    }

    fn release(&self, _op: StreamOp<u32>) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }
}

fn class_of(raw: u8) -> OpClass {
    match raw % 3 {
        0 => OpClass::Read,
        1 => OpClass::Write,
        _ => OpClass::Other,
    }
}

fuzz_target!(|input: Input| {
    let options = ReorderOptions::from_bits(u32::from(input.reorder & 0x0f))
        .unwrap_or(ReorderOptions::STRICTLY_ORDERED);
    let scheduler: Scheduler<u32> = Scheduler::new();
    let client = Arc::new(Counter::default());
    scheduler.init(client.clone(), options).unwrap();

    let mut in_flight: Vec<StreamOp<u32>> = Vec::new();
    let mut admitted = 0usize;

    for action in input.actions.into_iter().take(512) {
        match action {
            Action::Open { stream, priority } => {
                let _ = scheduler.stream_open(u32::from(stream % 8), u32::from(priority % 40));
            }
            Action::Close { stream } => {
                let _ = scheduler.stream_close(u32::from(stream % 8));
            }
            Action::Enqueue { stream, class, count } => {
                let ops: Vec<_> = (0..u32::from(count % 8))
                    .map(|i| StreamOp::new(u32::from(stream % 8), class_of(class), i))
                    .collect();
                if let Ok(report) = scheduler.enqueue(ops) {
                    admitted += (count % 8) as usize - report.failed.len();
                }
            }
            Action::Dequeue => {
                if let Ok(op) = scheduler.dequeue(false) {
                    in_flight.push(op);
                }
            }
            Action::Complete { index, status } => {
                if in_flight.is_empty() {
                    continue;
                }
                let mut op = in_flight.swap_remove(index as usize % in_flight.len());
                op.set_result(Status(i32::from(status)));
                scheduler.async_complete(op);
            }
        }
        assert_eq!(scheduler.outstanding(), in_flight.len());
    }

    for mut op in in_flight {
        op.set_result(Status::OK);
        scheduler.async_complete(op);
    }
    scheduler.shutdown().unwrap();
    assert_eq!(client.released.load(Ordering::Relaxed), admitted);
    assert_eq!(scheduler.stream_count(), 0);
});
