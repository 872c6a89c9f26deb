//! Single-assignment result cell bridging the input thread and the
//! scheduler thread.

use std::sync::{Arc, Condvar, Mutex};

use crate::types::Outcome;

/// A one-shot cell: written exactly once, by whichever completion path gets
/// there first, and read exactly once by the blocked input thread.
///
/// First write wins; later writes are ignored so the scheduler-side
/// completion path and a racing forced shutdown cannot double-resolve.
#[derive(Clone)]
pub struct PendingCell {
    inner: Arc<Inner>,
}

struct Inner {
    slot: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl PendingCell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Resolve the cell. Returns true when this call performed the one
    /// assignment, false when it was already resolved.
    pub fn resolve(&self, outcome: Outcome) -> bool {
        let mut slot = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.inner.ready.notify_all();
        true
    }

    /// Block until the cell is resolved and take the outcome.
    pub fn wait(&self) -> Outcome {
        let mut slot = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        loop {
            match slot.take() {
                Some(outcome) => return outcome,
                None => {
                    slot = self
                        .inner
                        .ready
                        .wait(slot)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }
}

impl Default for PendingCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_write_wins() {
        let cell = PendingCell::new();
        assert!(cell.resolve(Outcome::Success(None)));
        assert!(!cell.resolve(Outcome::Cancelled));
        assert_eq!(cell.wait(), Outcome::Success(None));
    }

    #[test]
    fn test_wait_blocks_until_resolved_from_another_thread() {
        let cell = PendingCell::new();
        let writer = cell.clone();

        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.resolve(Outcome::Terminated(3));
        });

        assert_eq!(cell.wait(), Outcome::Terminated(3));
        thread.join().unwrap();
    }
}
