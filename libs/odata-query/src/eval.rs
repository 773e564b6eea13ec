//! `$filter` evaluation against JSON records.
//!
//! Coercion rules:
//! - an absent property behaves as `null`; `null eq null` holds,
//! - `eq`/`ne` never equate values of different kinds, except that a date-time
//!   compared with a string parses the string,
//! - two arrays or two objects are equal when deeply equal as JSON,
//! - ordering operators compare numbers, strings (by code point), booleans and
//!   date-times; any ordering involving `null` or mixed kinds is false,
//! - truthiness: `null`, absent, `false`, `0`, `NaN` and `""` are falsy.

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::ast::{CompareOperator, Expr, Value};
use crate::functions::FunctionTable;
use crate::temporal;

/// Runtime value produced while evaluating an expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand<'r> {
    /// Property path did not resolve.
    Absent,
    Null,
    Bool(bool),
    Number(f64),
    String(Cow<'r, str>),
    DateTime(DateTime<Utc>),
    /// JSON array or object taken from the record.
    Structured(&'r JsonValue),
}

impl<'r> Operand<'r> {
    #[must_use]
    pub fn from_json(value: &'r JsonValue) -> Self {
        match value {
            JsonValue::Null => Operand::Null,
            JsonValue::Bool(b) => Operand::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map_or(Operand::Null, Operand::Number),
            JsonValue::String(s) => Operand::String(Cow::Borrowed(s)),
            JsonValue::Array(_) | JsonValue::Object(_) => Operand::Structured(value),
        }
    }

    #[must_use]
    pub fn from_literal(value: &'r Value) -> Self {
        match value {
            Value::Null => Operand::Null,
            Value::Bool(b) => Operand::Bool(*b),
            Value::Number(n) => Operand::Number(*n),
            Value::String(s) => Operand::String(Cow::Borrowed(s)),
            Value::DateTime(dt) => Operand::DateTime(*dt),
        }
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Operand::Absent | Operand::Null)
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Operand::Absent | Operand::Null => false,
            Operand::Bool(b) => *b,
            Operand::Number(n) => n.abs() > 0.0,
            Operand::String(s) => !s.is_empty(),
            Operand::DateTime(_) | Operand::Structured(_) => true,
        }
    }

    /// String form used by the string functions.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Operand::Absent | Operand::Null => Cow::Borrowed(""),
            Operand::Bool(true) => Cow::Borrowed("true"),
            Operand::Bool(false) => Cow::Borrowed("false"),
            Operand::Number(n) => Cow::Owned(n.to_string()),
            Operand::String(s) => Cow::Borrowed(s.as_ref()),
            Operand::DateTime(dt) => Cow::Owned(temporal::format_timestamp(dt)),
            Operand::Structured(v) => Cow::Owned(v.to_string()),
        }
    }

    /// Numeric value; numeric strings are accepted.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            Operand::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Instant value; strings are parsed as ISO-8601 and numbers read as epoch milliseconds.
    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Operand::DateTime(dt) => Some(*dt),
            Operand::String(s) => temporal::parse_datetime(s),
            Operand::Number(n) => temporal::from_epoch_millis(*n),
            _ => None,
        }
    }
}

/// Natural ordering of two operands of a comparable kind.
fn natural_cmp(a: &Operand<'_>, b: &Operand<'_>) -> Option<Ordering> {
    match (a, b) {
        (Operand::Bool(x), Operand::Bool(y)) => Some(x.cmp(y)),
        (Operand::Number(x), Operand::Number(y)) => x.partial_cmp(y),
        (Operand::String(x), Operand::String(y)) => Some(x.cmp(y)),
        (Operand::DateTime(x), Operand::DateTime(y)) => Some(x.cmp(y)),
        (Operand::DateTime(x), Operand::String(s)) => {
            temporal::parse_datetime(s).map(|y| x.cmp(&y))
        }
        (Operand::String(s), Operand::DateTime(y)) => {
            temporal::parse_datetime(s).map(|x| x.cmp(y))
        }
        _ => None,
    }
}

fn strict_eq(a: &Operand<'_>, b: &Operand<'_>) -> bool {
    match (a, b) {
        _ if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Operand::Structured(x), Operand::Structured(y)) => x == y,
        _ => natural_cmp(a, b) == Some(Ordering::Equal),
    }
}

/// Apply a comparison operator under the coercion rules above.
#[must_use]
pub fn compare(op: CompareOperator, a: &Operand<'_>, b: &Operand<'_>) -> bool {
    match op {
        CompareOperator::Eq => strict_eq(a, b),
        CompareOperator::Ne => !strict_eq(a, b),
        CompareOperator::Gt => natural_cmp(a, b) == Some(Ordering::Greater),
        CompareOperator::Ge => matches!(
            natural_cmp(a, b),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOperator::Lt => natural_cmp(a, b) == Some(Ordering::Less),
        CompareOperator::Le => matches!(natural_cmp(a, b), Some(Ordering::Less | Ordering::Equal)),
    }
}

/// Evaluates parsed expressions against records.
///
/// Evaluation is total: every operand is computed (no short-circuiting) and no
/// input record can make it fail.
#[derive(Clone, Copy, Debug)]
pub struct Evaluator<'f> {
    functions: &'f FunctionTable,
}

impl<'f> Evaluator<'f> {
    #[must_use]
    pub fn new(functions: &'f FunctionTable) -> Self {
        Self { functions }
    }

    #[must_use]
    pub fn evaluate<'r>(&self, expr: &'r Expr, record: &'r JsonValue) -> Operand<'r> {
        match expr {
            Expr::And(a, b) => {
                let left = self.evaluate(a, record).truthy();
                let right = self.evaluate(b, record).truthy();
                Operand::Bool(left && right)
            }
            Expr::Or(a, b) => {
                let left = self.evaluate(a, record).truthy();
                let right = self.evaluate(b, record).truthy();
                Operand::Bool(left || right)
            }
            Expr::Not(inner) => Operand::Bool(!self.evaluate(inner, record).truthy()),
            Expr::Compare(a, op, b) => {
                let left = self.evaluate(a, record);
                let right = self.evaluate(b, record);
                Operand::Bool(compare(*op, &left, &right))
            }
            Expr::In(needle, items) => {
                let needle = self.evaluate(needle, record);
                let items: Vec<Operand<'r>> =
                    items.iter().map(|item| self.evaluate(item, record)).collect();
                Operand::Bool(items.iter().any(|item| strict_eq(&needle, item)))
            }
            Expr::Function(name, args) => {
                let args: Vec<Operand<'r>> =
                    args.iter().map(|arg| self.evaluate(arg, record)).collect();
                self.functions.call(name, &args)
            }
            Expr::Identifier(path) => path
                .resolve(record)
                .map_or(Operand::Absent, Operand::from_json),
            Expr::Value(value) => Operand::from_literal(value),
        }
    }

    /// Whether `record` satisfies `expr`.
    #[must_use]
    pub fn matches(&self, expr: &Expr, record: &JsonValue) -> bool {
        self.evaluate(expr, record).truthy()
    }
}
