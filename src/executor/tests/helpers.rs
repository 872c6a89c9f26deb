//! Test helpers for executor tests.

use crate::executor::{evaluate, Evaluated, EvalError, ExecutionContext, Val};
use crate::parser::parse_line;

/// Parse and evaluate one line against the given context.
pub fn eval_src(source: &str, ctx: &ExecutionContext) -> Result<Evaluated, EvalError> {
    let unit = parse_line(source).expect("parse failed");
    evaluate(&unit, ctx)
}

/// Parse and evaluate one line, expecting synchronous completion with a value.
pub fn eval_value(source: &str, ctx: &ExecutionContext) -> Val {
    match eval_src(source, ctx).expect("evaluation failed") {
        Evaluated::Value(Some(v)) => v,
        other => panic!("expected a value for {:?}, got {:?}", source, other),
    }
}

/// Parse and evaluate one line, expecting a user error; returns its rendering.
pub fn eval_error(source: &str, ctx: &ExecutionContext) -> String {
    match eval_src(source, ctx) {
        Err(EvalError::Raise(info)) => info.to_string(),
        other => panic!("expected an error for {:?}, got {:?}", source, other),
    }
}
