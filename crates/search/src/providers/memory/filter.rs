//! Minimal OData filter subset for the in-memory service.
//!
//! Supported clauses, joined with `and`:
//! - `Field op value` where `op` is `eq`, `ne`, `gt`, `ge`, `lt` or `le`
//! - `Collection/any(t: t eq value)`
//!
//! Values are single-quoted strings (`''` escapes a quote), numbers,
//! `true`, `false` or `null`. Paths may be nested (`Address/City`).

use crate::types::Document;
use grounded_core::{AppError, AppResult};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Op::Eq),
            "ne" => Some(Op::Ne),
            "gt" => Some(Op::Gt),
            "ge" => Some(Op::Ge),
            "lt" => Some(Op::Lt),
            "le" => Some(Op::Le),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Compare { path: String, op: Op, value: Value },
    Any { path: String, op: Op, value: Value },
}

/// A parsed conjunction of clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn parse(expression: &str) -> AppResult<Self> {
        let clauses = split_and(expression)
            .into_iter()
            .map(parse_clause)
            .collect::<AppResult<Vec<_>>>()?;

        if clauses.is_empty() {
            return Err(unsupported(expression, "empty filter"));
        }
        Ok(Self { clauses })
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Compare { path, op, value } => document
                .get(path)
                .map_or(*op == Op::Ne && !value.is_null(), |actual| {
                    compare(actual, *op, value)
                }),
            Clause::Any { path, op, value } => document
                .get(path)
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|item| compare(item, *op, value))),
        })
    }
}

/// Split on ` and ` outside quoted strings.
fn split_and(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let bytes = expression.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_quotes = !in_quotes;
        } else if !in_quotes && bytes[i..].starts_with(b" and ") {
            parts.push(expression[start..i].trim());
            i += " and ".len();
            start = i;
            continue;
        }
        i += 1;
    }
    parts.push(expression[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

fn parse_clause(clause: &str) -> AppResult<Clause> {
    if let Some((path, lambda)) = clause.split_once("/any(") {
        let body = lambda
            .strip_suffix(')')
            .ok_or_else(|| unsupported(clause, "unterminated any()"))?;
        let (variable, predicate) = body
            .split_once(':')
            .ok_or_else(|| unsupported(clause, "any() requires a lambda"))?;
        let (lhs, op, value) = parse_comparison(predicate.trim(), clause)?;
        if lhs != variable.trim() {
            return Err(unsupported(clause, "lambda must compare its own variable"));
        }
        return Ok(Clause::Any {
            path: path.trim().to_string(),
            op,
            value,
        });
    }

    let (path, op, value) = parse_comparison(clause, clause)?;
    Ok(Clause::Compare {
        path: path.to_string(),
        op,
        value,
    })
}

fn parse_comparison<'a>(text: &'a str, clause: &str) -> AppResult<(&'a str, Op, Value)> {
    let mut parts = text.splitn(3, ' ');
    let lhs = parts.next().unwrap_or_default();
    let op = parts
        .next()
        .and_then(Op::parse)
        .ok_or_else(|| unsupported(clause, "expected an operator"))?;
    let literal = parts
        .next()
        .ok_or_else(|| unsupported(clause, "missing value"))?;
    Ok((lhs, op, parse_literal(literal.trim(), clause)?))
}

fn parse_literal(literal: &str, clause: &str) -> AppResult<Value> {
    if let Some(quoted) = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(Value::String(quoted.replace("''", "'")));
    }
    match literal {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        _ => literal
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| unsupported(clause, "unrecognized literal")),
    }
}

fn compare(actual: &Value, op: Op, expected: &Value) -> bool {
    let ordering = match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    };

    match (op, ordering) {
        (Op::Eq, Some(o)) => o == Ordering::Equal,
        (Op::Ne, Some(o)) => o != Ordering::Equal,
        (Op::Ne, None) => true,
        (Op::Gt, Some(o)) => o == Ordering::Greater,
        (Op::Ge, Some(o)) => o != Ordering::Less,
        (Op::Lt, Some(o)) => o == Ordering::Less,
        (Op::Le, Some(o)) => o != Ordering::Greater,
        _ => false,
    }
}

fn unsupported(clause: &str, reason: &str) -> AppError {
    AppError::SearchUnavailable(format!(
        "Unsupported filter '{}': {}",
        clause, reason
    ))
}
