//! PEST-based parser for console input.
//!
//! Turns one line of input into an immutable [`Unit`] ready for submission to
//! the execution bridge. `await` is restricted to statement level so that a
//! unit either completes synchronously or suspends exactly once at its top
//! level; nested awaits are a parse error, not a runtime surprise.

use std::sync::LazyLock;

use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;


/* ===================== AST ===================== */

/// One parsed statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Stmt {
    /// `name = expr` or `name = await expr`
    Assign { name: String, value: RValue },
    /// Bare `expr` or `await expr`
    Expr(RValue),
    /// Blank line or comment-only line
    Empty,
}

/// The right-hand side of a statement, with its top-level await flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RValue {
    pub expr: Expr,
    /// True when the value is produced by `await expr`.
    pub awaited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Expr>),
    Ident(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// One immutable, already-parsed unit of code ready for submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    /// Original source text, kept for error reporting.
    pub source: String,
    pub stmt: Stmt,
    /// True when the unit contains a top-level suspension point.
    pub has_await: bool,
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/repl.pest"]
struct ReplParser;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left) | Op::infix(Rule::ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
});

/* ===================== Error Types ===================== */

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::Syntax(err.to_string())
    }
}

/* ===================== Entry Point ===================== */

/// Parse one line of console input into a [`Unit`].
pub fn parse_line(source: &str) -> Result<Unit, ParseError> {
    let mut pairs = ReplParser::parse(Rule::line, source)?;
    let line = pairs
        .next()
        .ok_or_else(|| ParseError::Syntax("empty parse".to_string()))?;

    let stmt_pair = line
        .into_inner()
        .find(|p| p.as_rule() == Rule::stmt);

    let stmt = match stmt_pair {
        Some(pair) => build_stmt(pair)?,
        None => Stmt::Empty,
    };

    let has_await = match &stmt {
        Stmt::Assign { value, .. } => value.awaited,
        Stmt::Expr(value) => value.awaited,
        Stmt::Empty => false,
    };

    Ok(Unit {
        source: source.to_string(),
        stmt,
        has_await,
    })
}

/* ===================== AST Construction ===================== */

fn build_stmt(pair: Pair<Rule>) -> Result<Stmt, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::Syntax("empty statement".to_string()))?;

    match inner.as_rule() {
        Rule::assign => {
            let mut parts = inner.into_inner();
            let name = parts
                .next()
                .ok_or_else(|| ParseError::Syntax("assignment missing target".to_string()))?
                .as_str()
                .to_string();
            let rhs = parts
                .next()
                .ok_or_else(|| ParseError::Syntax("assignment missing value".to_string()))?;
            Ok(Stmt::Assign {
                name,
                value: build_rvalue(rhs)?,
            })
        }
        Rule::await_stmt | Rule::expr => Ok(Stmt::Expr(build_rvalue(inner)?)),
        other => Err(ParseError::Syntax(format!(
            "unexpected statement rule: {:?}",
            other
        ))),
    }
}

fn build_rvalue(pair: Pair<Rule>) -> Result<RValue, ParseError> {
    match pair.as_rule() {
        Rule::await_stmt => {
            let inner = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .ok_or_else(|| ParseError::Syntax("await missing operand".to_string()))?;
            Ok(RValue {
                expr: build_expr(inner)?,
                awaited: true,
            })
        }
        Rule::expr => Ok(RValue {
            expr: build_expr(pair)?,
            awaited: false,
        }),
        other => Err(ParseError::Syntax(format!(
            "unexpected value rule: {:?}",
            other
        ))),
    }
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::neg => UnaryOp::Neg,
                Rule::not => UnaryOp::Not,
                other => {
                    return Err(ParseError::Syntax(format!(
                        "unexpected prefix operator: {:?}",
                        other
                    )))
                }
            };
            Ok(Expr::Unary {
                op,
                operand: Box::new(rhs?),
            })
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                Rule::rem => BinaryOp::Rem,
                Rule::eq => BinaryOp::Eq,
                Rule::ne => BinaryOp::Ne,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::and => BinaryOp::And,
                Rule::or => BinaryOp::Or,
                other => {
                    return Err(ParseError::Syntax(format!(
                        "unexpected infix operator: {:?}",
                        other
                    )))
                }
            };
            Ok(Expr::Binary {
                op,
                left: Box::new(lhs?),
                right: Box::new(rhs?),
            })
        })
        .parse(pair.into_inner())
}

fn build_primary(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    match pair.as_rule() {
        Rule::null => Ok(Expr::Null),
        Rule::boolean => Ok(Expr::Bool(pair.as_str() == "true")),
        Rule::number => {
            let text = pair.as_str();
            text.parse::<f64>()
                .map(Expr::Num)
                .map_err(|_| ParseError::Syntax(format!("invalid number: {}", text)))
        }
        Rule::string => {
            let text = pair.as_str();
            Ok(Expr::Str(text[1..text.len() - 1].to_string()))
        }
        Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
        Rule::group => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| ParseError::Syntax("empty parenthesized expression".to_string()))?;
            build_expr(inner)
        }
        Rule::list => {
            let items = match pair.into_inner().next() {
                Some(args) => args
                    .into_inner()
                    .map(build_expr)
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Ok(Expr::List(items))
        }
        Rule::call => {
            let mut parts = pair.into_inner();
            let name = parts
                .next()
                .ok_or_else(|| ParseError::Syntax("call missing name".to_string()))?
                .as_str()
                .to_string();
            let args = match parts.next() {
                Some(args) => args
                    .into_inner()
                    .map(build_expr)
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Ok(Expr::Call { name, args })
        }
        other => Err(ParseError::Syntax(format!(
            "unexpected primary rule: {:?}",
            other
        ))),
    }
}
