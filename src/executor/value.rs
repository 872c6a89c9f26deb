//! Runtime value type for the console namespace.

use serde::{Deserialize, Serialize};

/// A runtime value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    /// A deferred computation. Only `await` consumes it.
    Promise(Awaitable),
}

/// What a promise is waiting on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Awaitable {
    /// Resolves to null after the delay elapses.
    Timer { delay_ms: u64 },
    /// Never resolves; only cancellation releases the waiter.
    Never,
}

impl Val {
    /// Truthiness: null and false are false; numbers, strings and lists are
    /// true when non-zero / non-empty; promises are always true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0,
            Val::Str(s) => !s.is_empty(),
            Val::List(items) => !items.is_empty(),
            Val::Promise(_) => true,
        }
    }

    /// Short name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Num(_) => "num",
            Val::Str(_) => "str",
            Val::List(_) => "list",
            Val::Promise(_) => "promise",
        }
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Val::Str(s) => write!(f, "\"{}\"", s),
            Val::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Val::Promise(Awaitable::Timer { delay_ms }) => {
                write!(f, "<promise: timer {}ms>", delay_ms)
            }
            Val::Promise(Awaitable::Never) => write!(f, "<promise: pending>"),
        }
    }
}
