//! Error types raised by user-submitted code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user-visible error: a kind tag plus a message, printed as
/// `KindError: message` the way the console reports failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Everything evaluation of a unit can fail with.
///
/// `Raise` is an ordinary user error; `Interrupted` and `Exit` are control
/// flow that the bridge maps to cancellation and termination outcomes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("{0}")]
    Raise(ErrorInfo),
    #[error("interrupted")]
    Interrupted,
    #[error("exit requested with status {0}")]
    Exit(i32),
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::Raise(ErrorInfo::new("TypeError", message))
    }

    pub fn name_error(name: &str) -> Self {
        EvalError::Raise(ErrorInfo::new(
            "NameError",
            format!("name '{}' is not defined", name),
        ))
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        EvalError::Raise(ErrorInfo::new("ValueError", message))
    }
}
