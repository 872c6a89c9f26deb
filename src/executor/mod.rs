//! Evaluation of parsed units against the shared console namespace.
//!
//! Evaluation is deliberately split in two:
//!
//! - [`evaluate`] runs synchronously on the scheduler thread and either
//!   completes the unit outright or stops at its single top-level `await`,
//!   returning a [`Suspension`] describing what to wait for.
//! - [`Suspension::run`] is the suspended remainder: an async task the bridge
//!   spawns on the cooperative scheduler, which drives the awaitable and then
//!   finishes the statement (binding the result or producing it for display).
//!
//! The synchronous path observes the cooperative interrupt flag between
//! evaluation steps; the asynchronous path is cancelled via task abort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub mod errors;
pub mod value;

pub use errors::{ErrorInfo, EvalError};
pub use value::{Awaitable, Val};

use crate::parser::{BinaryOp, Expr, RValue, Stmt, UnaryOp, Unit};

#[cfg(test)]
mod tests;

/* ===================== Execution Context ===================== */

/// Ambient state shared by every submission in a session.
///
/// Created once at console bring-up and handed to each unit in turn, so a
/// binding made by statement N is visible to statement N+1. The namespace is
/// only ever written by code running on the scheduler thread; submissions are
/// strictly serialized, so the mutex is never contended across statements.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    namespace: Mutex<HashMap<String, Val>>,
    interrupted: AtomicBool,
    executing: AtomicBool,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(namespace: HashMap<String, Val>) -> Self {
        Self {
            namespace: Mutex::new(namespace),
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<Val> {
        self.lock_namespace().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Val) {
        self.lock_namespace().insert(name.to_string(), value);
    }

    /// Request cooperative interruption of the synchronous section.
    pub fn arm_interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// Consume a pending interrupt request, if any.
    pub fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// True while a unit's synchronous section is running on the scheduler
    /// thread.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Mark the synchronous section as running for the lifetime of the guard.
    pub fn enter_sync(&self) -> SyncGuard<'_> {
        self.executing.store(true, Ordering::SeqCst);
        SyncGuard { ctx: self }
    }

    fn lock_namespace(&self) -> std::sync::MutexGuard<'_, HashMap<String, Val>> {
        self.namespace.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct SyncGuard<'a> {
    ctx: &'a ExecutionContext,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.ctx.executing.store(false, Ordering::SeqCst);
        // An interrupt that raced with the end of the synchronous section is
        // dropped here so it cannot leak into the next submission.
        self.ctx.interrupted.store(false, Ordering::SeqCst);
    }
}

/* ===================== Evaluation ===================== */

/// What the synchronous section of a unit produced.
#[derive(Debug, PartialEq)]
pub enum Evaluated {
    /// The unit ran to completion. `None` means nothing to display.
    Value(Option<Val>),
    /// The unit reached its top-level `await` and must be resumed by the
    /// cooperative scheduler.
    Suspended(Suspension),
}

/// The suspended remainder of a unit: the awaitable to drive plus where the
/// resulting value goes once it resolves.
#[derive(Debug, PartialEq)]
pub struct Suspension {
    awaitable: Awaitable,
    bind: Option<String>,
}

impl Suspension {
    /// Drive the awaitable to completion on the cooperative scheduler, then
    /// finish the statement against the shared context.
    pub async fn run(self, ctx: Arc<ExecutionContext>) -> Result<Option<Val>, EvalError> {
        let value = drive_awaitable(self.awaitable).await?;
        match self.bind {
            Some(name) => {
                ctx.set(&name, value);
                Ok(None)
            }
            None => Ok(Some(value)),
        }
    }
}

async fn drive_awaitable(awaitable: Awaitable) -> Result<Val, EvalError> {
    match awaitable {
        Awaitable::Timer { delay_ms } => {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(Val::Null)
        }
        Awaitable::Never => std::future::pending().await,
    }
}

/// Run the synchronous section of a unit.
///
/// Completes the whole unit when it has no top-level `await`; otherwise
/// evaluates the awaited operand and returns the [`Suspension`] to spawn.
pub fn evaluate(unit: &Unit, ctx: &ExecutionContext) -> Result<Evaluated, EvalError> {
    match &unit.stmt {
        Stmt::Empty => Ok(Evaluated::Value(None)),
        Stmt::Assign { name, value } => match eval_rvalue(value, ctx)? {
            RValueOutcome::Ready(v) => {
                ctx.set(name, v);
                Ok(Evaluated::Value(None))
            }
            RValueOutcome::Awaiting(awaitable) => Ok(Evaluated::Suspended(Suspension {
                awaitable,
                bind: Some(name.clone()),
            })),
        },
        Stmt::Expr(value) => match eval_rvalue(value, ctx)? {
            RValueOutcome::Ready(v) => Ok(Evaluated::Value(Some(v))),
            RValueOutcome::Awaiting(awaitable) => Ok(Evaluated::Suspended(Suspension {
                awaitable,
                bind: None,
            })),
        },
    }
}

enum RValueOutcome {
    Ready(Val),
    Awaiting(Awaitable),
}

fn eval_rvalue(value: &RValue, ctx: &ExecutionContext) -> Result<RValueOutcome, EvalError> {
    let v = eval_expr(&value.expr, ctx)?;
    if !value.awaited {
        return Ok(RValueOutcome::Ready(v));
    }
    match v {
        Val::Promise(awaitable) => Ok(RValueOutcome::Awaiting(awaitable)),
        other => Err(EvalError::type_error(format!(
            "{} is not awaitable",
            other.type_name()
        ))),
    }
}

pub fn eval_expr(expr: &Expr, ctx: &ExecutionContext) -> Result<Val, EvalError> {
    if ctx.take_interrupt() {
        return Err(EvalError::Interrupted);
    }

    match expr {
        Expr::Null => Ok(Val::Null),
        Expr::Bool(b) => Ok(Val::Bool(*b)),
        Expr::Num(n) => Ok(Val::Num(*n)),
        Expr::Str(s) => Ok(Val::Str(s.clone())),
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|item| eval_expr(item, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Val::List(values))
        }
        Expr::Ident(name) => ctx.get(name).ok_or_else(|| EvalError::name_error(name)),
        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, ctx)?;
            match op {
                UnaryOp::Neg => match v {
                    Val::Num(n) => Ok(Val::Num(-n)),
                    other => Err(EvalError::type_error(format!(
                        "cannot negate {}",
                        other.type_name()
                    ))),
                },
                UnaryOp::Not => Ok(Val::Bool(!v.is_truthy())),
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx),
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|arg| eval_expr(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call_builtin(name, values)
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &ExecutionContext,
) -> Result<Val, EvalError> {
    // Logical operators short-circuit; everything else evaluates both sides.
    match op {
        BinaryOp::And => {
            let l = eval_expr(left, ctx)?;
            if !l.is_truthy() {
                return Ok(l);
            }
            return eval_expr(right, ctx);
        }
        BinaryOp::Or => {
            let l = eval_expr(left, ctx)?;
            if l.is_truthy() {
                return Ok(l);
            }
            return eval_expr(right, ctx);
        }
        _ => {}
    }

    let l = eval_expr(left, ctx)?;
    let r = eval_expr(right, ctx)?;

    match op {
        BinaryOp::Eq => Ok(Val::Bool(l == r)),
        BinaryOp::Ne => Ok(Val::Bool(l != r)),
        BinaryOp::Add => match (l, r) {
            (Val::Num(a), Val::Num(b)) => Ok(Val::Num(a + b)),
            (Val::Str(a), Val::Str(b)) => Ok(Val::Str(a + &b)),
            (Val::List(mut a), Val::List(b)) => {
                a.extend(b);
                Ok(Val::List(a))
            }
            (a, b) => Err(EvalError::type_error(format!(
                "cannot add {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = expect_nums(&l, &r, op)?;
            match op {
                BinaryOp::Sub => Ok(Val::Num(a - b)),
                BinaryOp::Mul => Ok(Val::Num(a * b)),
                BinaryOp::Div => {
                    if b == 0.0 {
                        Err(EvalError::Raise(ErrorInfo::new(
                            "ZeroDivisionError",
                            "division by zero",
                        )))
                    } else {
                        Ok(Val::Num(a / b))
                    }
                }
                BinaryOp::Rem => {
                    if b == 0.0 {
                        Err(EvalError::Raise(ErrorInfo::new(
                            "ZeroDivisionError",
                            "remainder by zero",
                        )))
                    } else {
                        Ok(Val::Num(a % b))
                    }
                }
                _ => unreachable!(),
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let (a, b) = expect_nums(&l, &r, op)?;
            let result = match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::Ge => a >= b,
                _ => unreachable!(),
            };
            Ok(Val::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn expect_nums(l: &Val, r: &Val, op: BinaryOp) -> Result<(f64, f64), EvalError> {
    match (l, r) {
        (Val::Num(a), Val::Num(b)) => Ok((*a, *b)),
        (a, b) => Err(EvalError::type_error(format!(
            "{:?} requires numbers, got {} and {}",
            op,
            a.type_name(),
            b.type_name()
        ))),
    }
}

/* ===================== Builtins ===================== */

fn call_builtin(name: &str, args: Vec<Val>) -> Result<Val, EvalError> {
    match name {
        "delay" => {
            let [arg] = take_args::<1>(name, args)?;
            match arg {
                Val::Num(ms) if ms >= 0.0 => Ok(Val::Promise(Awaitable::Timer {
                    delay_ms: ms as u64,
                })),
                Val::Num(_) => Err(EvalError::value_error("delay() requires a non-negative ms")),
                other => Err(EvalError::type_error(format!(
                    "delay() requires a number, got {}",
                    other.type_name()
                ))),
            }
        }
        "pending" => {
            take_args::<0>(name, args)?;
            Ok(Val::Promise(Awaitable::Never))
        }
        "len" => {
            let [arg] = take_args::<1>(name, args)?;
            match arg {
                Val::Str(s) => Ok(Val::Num(s.chars().count() as f64)),
                Val::List(items) => Ok(Val::Num(items.len() as f64)),
                other => Err(EvalError::type_error(format!(
                    "len() requires a string or list, got {}",
                    other.type_name()
                ))),
            }
        }
        "type" => {
            let [arg] = take_args::<1>(name, args)?;
            Ok(Val::Str(arg.type_name().to_string()))
        }
        "print" => {
            let line = args
                .iter()
                .map(display_raw)
                .collect::<Vec<_>>()
                .join(" ");
            println!("{}", line);
            Ok(Val::Null)
        }
        "raise" => match args.len() {
            0 => Err(EvalError::Raise(ErrorInfo::new("Error", "raise()"))),
            1 => Err(EvalError::Raise(ErrorInfo::new(
                "Error",
                display_raw(&args[0]),
            ))),
            2 => Err(EvalError::Raise(ErrorInfo::new(
                display_raw(&args[0]),
                display_raw(&args[1]),
            ))),
            n => Err(EvalError::type_error(format!(
                "raise() takes at most 2 arguments, got {}",
                n
            ))),
        },
        "exit" => match args.len() {
            0 => Err(EvalError::Exit(0)),
            1 => match &args[0] {
                Val::Num(n) => Err(EvalError::Exit(*n as i32)),
                other => Err(EvalError::type_error(format!(
                    "exit() requires a number, got {}",
                    other.type_name()
                ))),
            },
            n => Err(EvalError::type_error(format!(
                "exit() takes at most 1 argument, got {}",
                n
            ))),
        },
        other => Err(EvalError::name_error(other)),
    }
}

fn take_args<const N: usize>(name: &str, args: Vec<Val>) -> Result<[Val; N], EvalError> {
    let got = args.len();
    args.try_into().map_err(|_| {
        EvalError::type_error(format!("{}() takes {} argument(s), got {}", name, N, got))
    })
}

/// Strings print without quotes when passed to `print`; everything else uses
/// the normal display form.
fn display_raw(v: &Val) -> String {
    match v {
        Val::Str(s) => s.clone(),
        other => other.to_string(),
    }
}
