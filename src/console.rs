//! The input loop.
//!
//! Runs on its own dedicated thread, never on the scheduler thread: it blocks
//! on stdin, hands each parsed unit to the execution bridge, and prints the
//! outcome before reading the next line. Rendering is kept as pure functions
//! so the display contract is testable without a terminal.

use std::io::{self, BufRead, Write};

use crate::bridge::ExecutionBridge;
use crate::executor::Val;
use crate::parser::{parse_line, Stmt};
use crate::types::Outcome;

/// Banner printed at the top of an interactive session.
pub fn banner_text() -> String {
    format!(
        "cadenza {}\nUse \"await\" directly at the prompt. Type \"exit()\" to leave.\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// How one outcome is displayed, if at all. `None` means print nothing
/// (assignments, empty input, null results, termination).
pub fn render_outcome(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Success(Some(v)) if *v != Val::Null => Some(v.to_string()),
        Outcome::Success(_) => None,
        Outcome::Failure(info) => Some(info.to_string()),
        Outcome::Cancelled => Some("interrupted".to_string()),
        Outcome::Terminated(_) => None,
    }
}

pub struct Console {
    bridge: ExecutionBridge,
    prompt: String,
    banner: bool,
}

impl Console {
    pub fn new(bridge: ExecutionBridge, prompt: String, banner: bool) -> Self {
        Self {
            bridge,
            prompt,
            banner,
        }
    }

    /// Read-submit-print until end of input or a termination outcome.
    pub fn run(&self) {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        if self.banner {
            print!("{}", banner_text());
        }

        let mut line = String::new();
        loop {
            print!("{}", self.prompt);
            stdout.flush().ok();

            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // end of input
                Ok(_) => {}
                Err(err) => {
                    eprintln!("input error: {}", err);
                    break;
                }
            }

            let unit = match parse_line(line.trim_end()) {
                Ok(unit) => unit,
                Err(err) => {
                    eprintln!("{}", err);
                    continue;
                }
            };
            if unit.stmt == Stmt::Empty {
                continue;
            }

            let outcome = self.bridge.submit(unit);
            let terminal = outcome.is_terminal();
            if let Some(text) = render_outcome(&outcome) {
                match outcome {
                    Outcome::Success(_) => println!("{}", text),
                    _ => eprintln!("{}", text),
                }
            }
            if terminal {
                break;
            }
        }
    }
}

/// Run a multi-line script through the bridge, one statement at a time.
///
/// Stops at the first failure (status 1), interruption (status 130) or
/// termination (the requested status); returns 0 when every statement
/// succeeds. With `echo`, non-null success values are printed the way the
/// interactive console would print them.
pub fn run_script(bridge: &ExecutionBridge, source: &str, echo: bool) -> i32 {
    for (index, raw) in source.lines().enumerate() {
        let lineno = index + 1;

        let unit = match parse_line(raw) {
            Ok(unit) => unit,
            Err(err) => {
                eprintln!("line {}: {}", lineno, err);
                return 1;
            }
        };
        if unit.stmt == Stmt::Empty {
            continue;
        }

        match bridge.submit(unit) {
            Outcome::Success(Some(v)) => {
                if echo && v != Val::Null {
                    println!("{}", v);
                }
            }
            Outcome::Success(None) => {}
            Outcome::Failure(info) => {
                eprintln!("line {}: {}", lineno, info);
                return 1;
            }
            Outcome::Cancelled => {
                eprintln!("line {}: interrupted", lineno);
                return 130;
            }
            Outcome::Terminated(status) => return status,
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ErrorInfo;

    #[test]
    fn test_render_success_value() {
        let outcome = Outcome::Success(Some(Val::Num(42.0)));
        assert_eq!(render_outcome(&outcome), Some("42".to_string()));
    }

    #[test]
    fn test_render_hides_null_and_bindings() {
        assert_eq!(render_outcome(&Outcome::Success(Some(Val::Null))), None);
        assert_eq!(render_outcome(&Outcome::Success(None)), None);
    }

    #[test]
    fn test_render_failure_and_cancellation_are_distinct() {
        let failure = Outcome::Failure(ErrorInfo::new("NameError", "name 'x' is not defined"));
        assert_eq!(
            render_outcome(&failure),
            Some("NameError: name 'x' is not defined".to_string())
        );
        assert_eq!(
            render_outcome(&Outcome::Cancelled),
            Some("interrupted".to_string())
        );
    }

    #[test]
    fn test_render_termination_prints_nothing() {
        assert_eq!(render_outcome(&Outcome::Terminated(3)), None);
    }

    #[test]
    fn test_strings_render_quoted() {
        let outcome = Outcome::Success(Some(Val::Str("hi".to_string())));
        assert_eq!(render_outcome(&outcome), Some("\"hi\"".to_string()));
    }
}
