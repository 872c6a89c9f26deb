//! The cooperative scheduler thread.
//!
//! A thin loop over a current-thread tokio runtime plus a [`LocalSet`]: any
//! number of suspended units of work multiplex on one OS thread, and the only
//! cross-thread entry point is [`SchedulerHandle::post`], a non-blocking
//! enqueue of a callback that will run inside the loop. Everything else
//! (spawning, aborting) happens from code already running on the loop.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::LocalSet;
use tracing::debug;

/// A callback to run on the scheduler thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Raised when a callback is posted after the loop has shut down. Fatal to
/// the submission that tried to post, not to the process.
#[derive(Debug, Error)]
#[error("scheduler is not running")]
pub struct SchedulerStopped;

/// Process-wide stop state: whether the loop should stop, and the exit
/// status to report once it has. The status is last-write-wins and is only
/// read after the loop has stopped.
#[derive(Debug)]
pub struct TerminationSignal {
    stop: watch::Sender<bool>,
    status: Mutex<i32>,
}

impl TerminationSignal {
    /// Ask the loop to stop, keeping whatever exit status is already set.
    /// Idempotent; stopping an already-stopped loop is a no-op.
    pub fn request_stop(&self) {
        debug!("scheduler stop requested");
        self.stop.send_replace(true);
    }

    /// Ask the loop to stop with an explicit exit status.
    pub fn request_exit(&self, status: i32) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
        self.request_stop();
    }

    pub fn exit_status(&self) -> i32 {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }
}

/// Cloneable, thread-safe handle to the scheduler loop.
#[derive(Clone)]
pub struct SchedulerHandle {
    jobs: mpsc::UnboundedSender<Job>,
    term: Arc<TerminationSignal>,
}

impl SchedulerHandle {
    /// Enqueue a callback to run inside the loop. Safe to call from any
    /// thread; never blocks.
    pub fn post(&self, job: Job) -> Result<(), SchedulerStopped> {
        self.jobs.send(job).map_err(|_| SchedulerStopped)
    }

    pub fn request_stop(&self) {
        self.term.request_stop();
    }

    pub fn request_exit(&self, status: i32) {
        self.term.request_exit(status);
    }

    pub fn exit_status(&self) -> i32 {
        self.term.exit_status()
    }

    pub fn termination(&self) -> Arc<TerminationSignal> {
        self.term.clone()
    }
}

/// The loop itself. Created paired with its handle, then moved to a
/// dedicated thread and consumed by [`Scheduler::run_until_stopped`].
pub struct Scheduler {
    jobs: mpsc::UnboundedReceiver<Job>,
    stop: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new() -> (Scheduler, SchedulerHandle) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = SchedulerHandle {
            jobs: jobs_tx,
            term: Arc::new(TerminationSignal {
                stop: stop_tx,
                status: Mutex::new(0),
            }),
        };
        let scheduler = Scheduler {
            jobs: jobs_rx,
            stop: stop_rx,
        };
        (scheduler, handle)
    }

    /// Run the cooperative loop until a stop is requested.
    ///
    /// Posted callbacks run inside a [`LocalSet`], so they may call
    /// `tokio::task::spawn_local` to put suspended work on the loop. User
    /// code failures never reach this loop; only a stop request ends it.
    pub fn run_until_stopped(mut self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build scheduler runtime")?;
        let local = LocalSet::new();

        debug!("scheduler loop starting");
        local.block_on(&runtime, async move {
            loop {
                tokio::select! {
                    changed = self.stop.changed() => {
                        if changed.is_err() || *self.stop.borrow() {
                            break;
                        }
                    }
                    job = self.jobs.recv() => {
                        match job {
                            Some(job) => job(),
                            None => break,
                        }
                    }
                }
            }
        });
        debug!("scheduler loop stopped");

        Ok(())
    }
}
