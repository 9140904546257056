//! Tests for the worker dequeue-issue-complete loop.

use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;

use crate::scheduler::{
    Completer, IssueOutcome, OpClass, OpState, ReorderOptions, Scheduler, SchedulerClient,
    Status, StreamOp, WorkerPoolConfig,
};

#[derive(Default)]
struct Inline {
    seen: Mutex<Vec<(u64, OpState, Option<String>)>>,
    released: Mutex<Vec<(u64, Status)>>,
}

impl SchedulerClient<u64> for Inline {
    fn issue(&self, mut op: StreamOp<u64>) -> IssueOutcome<u64> {
        let name = thread::current().name().map(str::to_string);
        self.seen.lock().push((op.payload, op.state(), name));
        op.set_result(Status::OK);
        IssueOutcome::Complete(op)
    }

    fn release(&self, op: StreamOp<u64>) {
        let status = op.result().unwrap_or(Status::INTERNAL);
        self.released.lock().push((op.payload, status));
    }
}

/// Hands every op to a helper thread that completes it later.
#[derive(Default)]
struct Deferred {
    completer: OnceLock<Completer<u64>>,
    released: Mutex<Vec<u64>>,
}

impl SchedulerClient<u64> for Deferred {
    fn issue(&self, mut op: StreamOp<u64>) -> IssueOutcome<u64> {
        let completer = self.completer.get().unwrap().clone();
        thread::spawn(move || {
            op.set_result(Status::OK);
            completer.complete(op);
        });
        IssueOutcome::Pending
    }

    fn release(&self, op: StreamOp<u64>) {
        self.released.lock().push(op.payload);
    }
}

/// Fails fatally on payload 13.
#[derive(Default)]
struct Fragile {
    released: Mutex<Vec<(u64, Status)>>,
    fatal_calls: Mutex<Vec<String>>,
}

impl SchedulerClient<u64> for Fragile {
    fn issue(&self, mut op: StreamOp<u64>) -> IssueOutcome<u64> {
        if op.payload == 13 {
            return IssueOutcome::Fatal { op, reason: "device gone".into() };
        }
        op.set_result(Status::OK);
        IssueOutcome::Complete(op)
    }

    fn release(&self, op: StreamOp<u64>) {
        let status = op.result().unwrap_or(Status::OK);
        self.released.lock().push((op.payload, status));
    }

    fn fatal(&self, reason: &str) {
        self.fatal_calls.lock().push(reason.to_string());
    }
}

fn ops(stream_id: u32, payloads: &[u64]) -> Vec<StreamOp<u64>> {
    payloads
        .iter()
        .map(|&p| StreamOp::new(stream_id, OpClass::Write, p))
        .collect()
}

#[test]
fn worker_completes_inline_ops_in_stream_order() {
    let scheduler: Scheduler<u64> = Scheduler::new();
    let client = Arc::new(Inline::default());
    scheduler.init(client.clone(), ReorderOptions::STRICTLY_ORDERED).unwrap();
    scheduler.stream_open(1, 10).unwrap();
    scheduler.enqueue(ops(1, &[1, 2, 3, 4])).unwrap();

    scheduler.serve(&WorkerPoolConfig::with_threads(3)).unwrap();
    scheduler.shutdown().unwrap();

    let seen = client.seen.lock();
    let issued: Vec<u64> = seen.iter().map(|(payload, _, _)| *payload).collect();
    assert_eq!(issued, vec![1, 2, 3, 4]);
    for (_, state, name) in seen.iter() {
        assert_eq!(*state, OpState::Issued);
        assert!(name.as_deref().unwrap_or("").starts_with("iosched-worker-"));
    }

    let mut released = client.released.lock().clone();
    released.sort_unstable_by_key(|(payload, _)| *payload);
    assert_eq!(
        released,
        vec![(1, Status::OK), (2, Status::OK), (3, Status::OK), (4, Status::OK)]
    );
}

#[test]
fn pending_ops_complete_from_other_threads() {
    let scheduler: Scheduler<u64> = Scheduler::new();
    let client = Arc::new(Deferred::default());
    scheduler.init(client.clone(), ReorderOptions::FULLY_OUT_OF_ORDER).unwrap();
    assert!(client.completer.set(scheduler.completer()).is_ok());
    scheduler.stream_open(1, 1).unwrap();
    scheduler.stream_open(2, 2).unwrap();
    scheduler.enqueue(ops(1, &[10, 11, 12])).unwrap();
    scheduler.enqueue(ops(2, &[20, 21])).unwrap();

    scheduler.serve(&WorkerPoolConfig::with_threads(2)).unwrap();
    scheduler.shutdown().unwrap();

    let mut released = client.released.lock().clone();
    released.sort_unstable();
    assert_eq!(released, vec![10, 11, 12, 20, 21]);
    assert_eq!(scheduler.outstanding(), 0);
}

#[test]
fn fatal_error_stops_the_worker() {
    let scheduler: Scheduler<u64> = Scheduler::new();
    let client = Arc::new(Fragile::default());
    scheduler.init(client.clone(), ReorderOptions::STRICTLY_ORDERED).unwrap();
    scheduler.stream_open(1, 10).unwrap();
    scheduler.enqueue(ops(1, &[1, 13, 2])).unwrap();

    scheduler.serve(&WorkerPoolConfig::with_threads(1)).unwrap();
    scheduler.shutdown().unwrap();

    assert_eq!(scheduler.fatal_error().as_deref(), Some("device gone"));
    assert_eq!(client.fatal_calls.lock().as_slice(), ["device gone".to_string()]);
    let released = client.released.lock().clone();
    assert_eq!(
        released,
        vec![(1, Status::OK), (13, Status::INTERNAL), (2, Status::CANCELED)]
    );
}

#[test]
fn idle_workers_exit_on_shutdown() {
    let scheduler: Scheduler<u64> = Scheduler::new();
    scheduler
        .init(Arc::new(Inline::default()), ReorderOptions::STRICTLY_ORDERED)
        .unwrap();
    scheduler.serve(&WorkerPoolConfig::with_threads(4)).unwrap();
    assert_eq!(scheduler.stats().workers, 4);

    scheduler.shutdown().unwrap();
    let stats = scheduler.stats();
    assert_eq!(stats.workers, 0);
    assert!(stats.is_idle());
}
