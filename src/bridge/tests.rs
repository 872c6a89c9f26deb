use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bridge::ExecutionBridge;
use crate::executor::{ExecutionContext, Val};
use crate::parser::parse_line;
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::types::Outcome;

/// A live session: scheduler on its own thread, bridge on the test thread
/// playing the part of the input loop.
struct TestSession {
    bridge: Arc<ExecutionBridge>,
    handle: SchedulerHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl TestSession {
    fn start() -> Self {
        let ctx = Arc::new(ExecutionContext::new());
        let (scheduler, handle) = Scheduler::new();
        let bridge = Arc::new(ExecutionBridge::new(handle.clone(), ctx));
        let thread = std::thread::spawn(move || {
            scheduler.run_until_stopped().unwrap();
        });
        Self {
            bridge,
            handle,
            thread: Some(thread),
        }
    }

    fn submit(&self, source: &str) -> Outcome {
        self.bridge.submit(parse_line(source).expect("parse failed"))
    }

    /// Spin until the in-flight handle appears (or give up).
    fn wait_for_in_flight(&self) -> bool {
        for _ in 0..200 {
            if self.bridge.has_in_flight() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        self.handle.request_stop();
        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }
    }
}

#[test]
fn test_sync_submission_success_without_in_flight() {
    let session = TestSession::start();

    assert_eq!(session.submit("x = 1"), Outcome::Success(None));
    assert!(!session.bridge.has_in_flight());

    assert_eq!(session.submit("x"), Outcome::Success(Some(Val::Num(1.0))));
    assert!(!session.bridge.has_in_flight());
}

#[test]
fn test_failure_keeps_scheduler_alive() {
    let session = TestSession::start();

    match session.submit("nope") {
        Outcome::Failure(info) => assert_eq!(info.kind, "NameError"),
        other => panic!("expected failure, got {:?}", other),
    }

    // The loop survives arbitrarily many failing submissions.
    match session.submit("1 / 0") {
        Outcome::Failure(info) => assert_eq!(info.kind, "ZeroDivisionError"),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(session.submit("1 + 1"), Outcome::Success(Some(Val::Num(2.0))));
}

#[test]
fn test_suspending_submission_resolves_after_delay() {
    let session = TestSession::start();

    let started = Instant::now();
    let outcome = session.submit("await delay(30)");
    assert_eq!(outcome, Outcome::Success(Some(Val::Null)));
    assert!(started.elapsed() >= Duration::from_millis(30));

    // Handle cleared once the suspension completed.
    assert!(!session.bridge.has_in_flight());
}

#[test]
fn test_context_continuity_across_suspension() {
    let session = TestSession::start();

    assert_eq!(session.submit("x = 10"), Outcome::Success(None));
    assert_eq!(session.submit("y = await delay(5)"), Outcome::Success(None));
    assert_eq!(session.submit("y"), Outcome::Success(Some(Val::Null)));
    // Bindings made before the suspension are unchanged after it.
    assert_eq!(session.submit("x"), Outcome::Success(Some(Val::Num(10.0))));
}

#[test]
fn test_interrupt_cancels_suspended_unit_and_scheduler_survives() {
    let session = TestSession::start();
    let coordinator = session.bridge.interrupt_coordinator();

    let bridge = session.bridge.clone();
    let submitter = std::thread::spawn(move || {
        bridge.submit(parse_line("await pending()").unwrap())
    });

    assert!(session.wait_for_in_flight(), "suspension never registered");
    coordinator.deliver_interrupt();

    assert_eq!(submitter.join().unwrap(), Outcome::Cancelled);
    assert!(!session.bridge.has_in_flight());

    // A subsequent submission still succeeds.
    assert_eq!(session.submit("2 + 2"), Outcome::Success(Some(Val::Num(4.0))));
}

#[test]
fn test_repeated_interrupts_are_safe() {
    let session = TestSession::start();
    let coordinator = session.bridge.interrupt_coordinator();

    let bridge = session.bridge.clone();
    let submitter = std::thread::spawn(move || {
        bridge.submit(parse_line("await pending()").unwrap())
    });

    assert!(session.wait_for_in_flight());
    coordinator.deliver_interrupt();
    coordinator.deliver_interrupt();
    coordinator.deliver_interrupt();

    assert_eq!(submitter.join().unwrap(), Outcome::Cancelled);
}

#[test]
fn test_idle_interrupt_is_a_benign_noop() {
    let session = TestSession::start();
    let coordinator = session.bridge.interrupt_coordinator();

    let first = session.submit("v = 7");
    assert_eq!(first, Outcome::Success(None));

    coordinator.deliver_interrupt();

    // No prior outcome is altered and the next submission is untouched.
    assert_eq!(first, Outcome::Success(None));
    assert_eq!(session.submit("v"), Outcome::Success(Some(Val::Num(7.0))));
}

#[test]
fn test_termination_stops_scheduler_with_status() {
    let session = TestSession::start();

    assert_eq!(session.submit("exit(3)"), Outcome::Terminated(3));
    assert_eq!(session.handle.exit_status(), 3);

    // The loop shuts down on its own; once it has, submissions are refused
    // (bridge fault) or force-released with the recorded termination.
    for _ in 0..200 {
        match session.submit("1") {
            Outcome::Failure(info) => {
                assert_eq!(info.kind, "BridgeFault");
                return;
            }
            Outcome::Terminated(status) => {
                assert_eq!(status, 3);
                return;
            }
            Outcome::Success(_) => std::thread::sleep(Duration::from_millis(2)),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    panic!("scheduler never stopped after termination");
}

#[test]
fn test_awaited_assignment_binds_in_shared_namespace() {
    let session = TestSession::start();

    assert_eq!(session.submit("x = await delay(5)"), Outcome::Success(None));
    assert_eq!(session.submit("x == null"), Outcome::Success(Some(Val::Bool(true))));
}

#[test]
fn test_stored_promise_awaited_later() {
    let session = TestSession::start();

    assert_eq!(session.submit("p = delay(5)"), Outcome::Success(None));
    assert!(!session.bridge.has_in_flight());
    assert_eq!(session.submit("await p"), Outcome::Success(Some(Val::Null)));
}
