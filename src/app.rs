//! Session lifecycle: wires the input thread, the scheduler thread, the
//! execution bridge and the interrupt coordinator together.

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use crate::bridge::ExecutionBridge;
use crate::config::Config;
use crate::console::{self, Console};
use crate::executor::ExecutionContext;
use crate::scheduler::Scheduler;

/// Where the session's units of code come from.
pub enum SessionInput {
    /// Interactive prompt on stdin.
    Interactive,
    /// A fixed script, one statement per line. With `echo`, success values
    /// print the way the interactive console prints them.
    Script { source: String, echo: bool },
}

/// Run a complete session and return its exit status.
///
/// Blocks until the scheduler thread stops, either because user code
/// requested termination or because the input side reached end-of-input.
pub fn start(ctx: Arc<ExecutionContext>, config: &Config, input: SessionInput) -> Result<i32> {
    let (scheduler, handle) = Scheduler::new();
    let bridge = ExecutionBridge::new(handle.clone(), ctx);
    let coordinator = bridge.interrupt_coordinator();

    // The ctrl-c watcher lives on the scheduler loop; each signal becomes one
    // interrupt delivery.
    let watcher = {
        let coordinator = coordinator.clone();
        Box::new(move || {
            tokio::task::spawn_local(async move {
                loop {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => coordinator.deliver_interrupt(),
                        Err(err) => {
                            warn!("ctrl-c watcher unavailable: {}", err);
                            break;
                        }
                    }
                }
            });
        })
    };
    handle
        .post(watcher)
        .map_err(|_| anyhow!("scheduler stopped before session start"))?;

    let input_thread = {
        let handle = handle.clone();
        let prompt = config.prompt.clone();
        let banner = config.banner;
        thread::Builder::new()
            .name("cadenza-input".to_string())
            .spawn(move || {
                match input {
                    SessionInput::Interactive => {
                        Console::new(bridge, prompt, banner).run();
                        // End of input: tell the loop to stop, keeping any
                        // exit status already recorded by a termination.
                        handle.request_stop();
                    }
                    SessionInput::Script { source, echo } => {
                        let status = console::run_script(&bridge, &source, echo);
                        handle.request_exit(status);
                    }
                }
                debug!("input thread finished");
            })
            .context("Failed to spawn input thread")?
    };

    scheduler.run_until_stopped()?;
    input_thread
        .join()
        .map_err(|_| anyhow!("input thread panicked"))?;

    Ok(handle.exit_status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::InitBuilder;

    fn script(source: &str) -> SessionInput {
        SessionInput::Script {
            source: source.to_string(),
            echo: false,
        }
    }

    #[test]
    fn test_script_session_success_status() {
        let ctx = InitBuilder::new().build().unwrap();
        let status = start(ctx, &Config::default(), script("x = 1\nx + 1")).unwrap();
        assert_eq!(status, 0);
    }

    #[test]
    fn test_script_session_termination_status() {
        let ctx = InitBuilder::new().build().unwrap();
        let status = start(ctx, &Config::default(), script("x = 1\nexit(4)\nx")).unwrap();
        assert_eq!(status, 4);
    }

    #[test]
    fn test_script_session_failure_status() {
        let ctx = InitBuilder::new().build().unwrap();
        let status = start(ctx, &Config::default(), script("definitely_missing")).unwrap();
        assert_eq!(status, 1);
    }

    #[test]
    fn test_script_session_with_suspension() {
        let ctx = InitBuilder::new().build().unwrap();
        let status = start(
            ctx,
            &Config::default(),
            script("x = await delay(10)\nexit(7)"),
        )
        .unwrap();
        assert_eq!(status, 7);
    }
}
