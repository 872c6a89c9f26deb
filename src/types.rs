use serde::{Deserialize, Serialize};

use crate::executor::{ErrorInfo, Val};

/// The resolved result of one submission.
///
/// Exactly one of these is produced per unit of code handed to the execution
/// bridge, regardless of whether the unit completed synchronously, suspended
/// and resumed, was cancelled, or asked the process to exit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Outcome {
    /// The unit completed. `None` means there is nothing to print
    /// (assignments and empty input).
    Success(Option<Val>),
    /// The unit raised an error. The session keeps running.
    Failure(ErrorInfo),
    /// The unit was interrupted by the user before completing.
    Cancelled,
    /// The unit requested process exit with the given status.
    Terminated(i32),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Terminated(_))
    }
}
