//! The execution bridge between the input thread and the scheduler thread.
//!
//! The input thread calls [`ExecutionBridge::submit`] with one parsed unit at
//! a time. The bridge posts a callback onto the scheduler loop, blocks the
//! caller on a [`PendingCell`], and lets the scheduler-side callback decide
//! how the cell resolves: immediately for synchronous statements, or through
//! a spawned task for units that suspend at a top-level `await`.
//!
//! All execution, even of trivial statements, happens on the scheduler
//! thread; only the wait happens on the input thread. That keeps the shared
//! namespace single-writer without any extra locking discipline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::AbortHandle;
use tracing::debug;

use crate::executor::{evaluate, Evaluated, EvalError, ExecutionContext};
use crate::parser::Unit;
use crate::scheduler::SchedulerHandle;
use crate::types::Outcome;

pub mod interrupt;
pub mod pending;

pub use interrupt::InterruptCoordinator;
pub use pending::PendingCell;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

/// The one currently-suspended unit of work, if any.
///
/// Tagged with its submission id so a completion racing with a later
/// submission can never clear (or cancel) someone else's handle.
struct InFlight {
    submission: u64,
    abort: AbortHandle,
}

type InFlightSlot = Arc<Mutex<Option<InFlight>>>;

pub struct ExecutionBridge {
    scheduler: SchedulerHandle,
    ctx: Arc<ExecutionContext>,
    in_flight: InFlightSlot,
    next_submission: AtomicU64,
}

impl ExecutionBridge {
    pub fn new(scheduler: SchedulerHandle, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            scheduler,
            ctx,
            in_flight: Arc::new(Mutex::new(None)),
            next_submission: AtomicU64::new(0),
        }
    }

    /// The coordinator that delivers out-of-band interrupts for this bridge.
    pub fn interrupt_coordinator(&self) -> InterruptCoordinator {
        InterruptCoordinator::new(self.in_flight.clone(), self.ctx.clone())
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// True while a suspended unit of work is outstanding.
    pub fn has_in_flight(&self) -> bool {
        lock_slot(&self.in_flight).is_some()
    }

    /// Submit one unit of code and block until its outcome resolves.
    ///
    /// Called only from the input thread, one call at a time; the submission
    /// for unit N+1 is never created before unit N's outcome resolves.
    pub fn submit(&self, unit: Unit) -> Outcome {
        let submission = self.next_submission.fetch_add(1, Ordering::SeqCst);
        let cell = PendingCell::new();

        debug!(submission, source = %unit.source, "submitting unit");

        let job = {
            let release = ShutdownRelease::new(cell.clone(), self.scheduler.clone());
            let ctx = self.ctx.clone();
            let in_flight = self.in_flight.clone();
            let scheduler = self.scheduler.clone();
            Box::new(move || {
                let cell = release.into_cell();
                run_submission(submission, unit, ctx, cell, in_flight, scheduler);
            })
        };

        if self.scheduler.post(job).is_err() {
            // The loop is gone; fail this submission without blocking.
            return Outcome::Failure(bridge_fault());
        }

        cell.wait()
    }
}

/// Wakes the blocked input thread if a posted callback is discarded by a
/// stopping scheduler instead of being run. The scheduler shutting down must
/// be observable to the waiter; the submission is never silently abandoned.
struct ShutdownRelease {
    cell: Option<PendingCell>,
    scheduler: SchedulerHandle,
}

impl ShutdownRelease {
    fn new(cell: PendingCell, scheduler: SchedulerHandle) -> Self {
        Self {
            cell: Some(cell),
            scheduler,
        }
    }

    /// The callback is actually running; normal resolution takes over.
    fn into_cell(mut self) -> PendingCell {
        self.cell.take().expect("submission cell already released")
    }
}

impl Drop for ShutdownRelease {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            cell.resolve(Outcome::Terminated(self.scheduler.exit_status()));
        }
    }
}

/// Scheduler-side half of a submission. Runs inside the cooperative loop.
fn run_submission(
    submission: u64,
    unit: Unit,
    ctx: Arc<ExecutionContext>,
    cell: PendingCell,
    in_flight: InFlightSlot,
    scheduler: SchedulerHandle,
) {
    let evaluated = {
        let _guard = ctx.enter_sync();
        evaluate(&unit, &ctx)
    };

    let suspension = match evaluated {
        Ok(Evaluated::Value(v)) => {
            cell.resolve(Outcome::Success(v));
            return;
        }
        Ok(Evaluated::Suspended(suspension)) => suspension,
        Err(err) => {
            cell.resolve(error_outcome(err, &scheduler));
            return;
        }
    };

    // The unit suspended: put the remainder on the cooperative scheduler and
    // register it as the in-flight unit until it completes.
    debug!(submission, "unit suspended");
    let task = tokio::task::spawn_local(suspension.run(ctx));
    *lock_slot(&in_flight) = Some(InFlight {
        submission,
        abort: task.abort_handle(),
    });

    tokio::task::spawn_local(async move {
        let result = task.await;

        // Clear the handle only if it is still ours; a later submission may
        // already have replaced it by the time an aborted task settles.
        {
            let mut slot = lock_slot(&in_flight);
            if slot.as_ref().map(|f| f.submission) == Some(submission) {
                *slot = None;
            }
        }

        let outcome = match result {
            Ok(Ok(v)) => Outcome::Success(v),
            Ok(Err(err)) => error_outcome(err, &scheduler),
            Err(join_err) if join_err.is_cancelled() => Outcome::Cancelled,
            Err(join_err) => Outcome::Failure(crate::executor::ErrorInfo::new(
                "BridgeFault",
                format!("suspended unit failed: {}", join_err),
            )),
        };
        debug!(submission, ?outcome, "suspended unit resolved");
        cell.resolve(outcome);
    });
}

/// Map an evaluation error to its outcome, recording termination requests on
/// the scheduler as a side effect.
fn error_outcome(err: EvalError, scheduler: &SchedulerHandle) -> Outcome {
    match err {
        EvalError::Exit(status) => {
            // Explicitly resolve the waiter before the loop stops; the
            // submission is never silently abandoned.
            scheduler.request_exit(status);
            Outcome::Terminated(status)
        }
        EvalError::Interrupted => Outcome::Cancelled,
        EvalError::Raise(info) => Outcome::Failure(info),
    }
}

fn bridge_fault() -> crate::executor::ErrorInfo {
    crate::executor::ErrorInfo::new("BridgeFault", "scheduler is not running")
}

fn lock_slot(slot: &InFlightSlot) -> std::sync::MutexGuard<'_, Option<InFlight>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}
