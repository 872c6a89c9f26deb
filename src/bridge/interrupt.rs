//! Out-of-band interrupt delivery.

use std::sync::Arc;

use tracing::debug;

use crate::executor::ExecutionContext;

/// Delivers a user-requested cancel to whichever unit of work is currently
/// in flight, distinguishing three states: suspended work running, a
/// synchronous section running, and nothing running at all.
#[derive(Clone)]
pub struct InterruptCoordinator {
    in_flight: super::InFlightSlot,
    ctx: Arc<ExecutionContext>,
}

impl InterruptCoordinator {
    pub(super) fn new(in_flight: super::InFlightSlot, ctx: Arc<ExecutionContext>) -> Self {
        Self { in_flight, ctx }
    }

    /// Deliver one interrupt. Safe to call from any thread, at any time,
    /// repeatedly.
    ///
    /// - Suspended work in flight: abort exactly that task; its completion
    ///   path resolves the pending result as cancelled. The handle is read
    ///   live under the lock, so a submission that already completed can
    ///   never be confused with a later one.
    /// - Synchronous section running: arm the cooperative flag; the
    ///   evaluator observes it at its next step and unwinds as interrupted.
    /// - Idle: benign no-op.
    pub fn deliver_interrupt(&self) {
        let slot = super::lock_slot(&self.in_flight);
        if let Some(in_flight) = slot.as_ref() {
            debug!(submission = in_flight.submission, "interrupting suspended unit");
            in_flight.abort.abort();
            return;
        }
        drop(slot);

        if self.ctx.is_executing() {
            debug!("interrupting synchronous section");
            self.ctx.arm_interrupt();
        } else {
            debug!("interrupt delivered while idle; ignoring");
        }
    }
}
