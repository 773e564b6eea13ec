//! `$filter` abstract syntax tree.
//!
//! Built once per request by [`crate::parser`], immutable afterwards and owned by
//! the pipeline invocation that parsed it.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, CompareOperator, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Function(String, Vec<Expr>),
    Identifier(PropertyPath),
    Value(Value),
}

impl Expr {
    /// Combine two expressions with AND: `expr1 and expr2`
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    /// Combine two expressions with OR: `expr1 or expr2`
    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Negate an expression: `not expr`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        !self
    }

    /// Shorthand for a property reference parsed from a `/`-separated path.
    #[must_use]
    pub fn property(path: &str) -> Expr {
        Expr::Identifier(PropertyPath::parse(path))
    }

    /// Shorthand for `left op right`.
    #[must_use]
    pub fn compare(left: Expr, op: CompareOperator, right: Expr) -> Expr {
        Expr::Compare(Box::new(left), op, Box::new(right))
    }

    /// Number of AST nodes, used for the complexity budget.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Value(_) | Expr::Identifier(_) => 1,
            Expr::Not(x) => 1 + x.node_count(),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(a, _, b) => {
                1 + a.node_count() + b.node_count()
            }
            Expr::In(a, list) => 1 + a.node_count() + list.iter().map(Expr::node_count).sum::<usize>(),
            Expr::Function(_, args) => 1 + args.iter().map(Expr::node_count).sum::<usize>(),
        }
    }

    fn is_logical(&self) -> bool {
        matches!(self, Expr::And(..) | Expr::Or(..))
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        Expr::Not(Box::new(self))
    }
}

/// Renders the expression back in `$filter` syntax. Nested logical operands, and
/// any non-leaf side of a comparison or `in`, are parenthesized, so the output
/// re-parses to the same tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn operand(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
            if e.is_logical() {
                write!(f, "({e})")
            } else {
                write!(f, "{e}")
            }
        }

        fn comparand(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
            match e {
                Expr::Identifier(_) | Expr::Value(_) | Expr::Function(..) => write!(f, "{e}"),
                _ => write!(f, "({e})"),
            }
        }

        fn list(
            f: &mut fmt::Formatter<'_>,
            items: &[Expr],
            item: fn(&mut fmt::Formatter<'_>, &Expr) -> fmt::Result,
        ) -> fmt::Result {
            for (i, e) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                item(f, e)?;
            }
            Ok(())
        }

        match self {
            Expr::And(a, b) | Expr::Or(a, b) => {
                let keyword = if matches!(self, Expr::And(..)) { "and" } else { "or" };
                operand(f, a)?;
                write!(f, " {keyword} ")?;
                operand(f, b)
            }
            Expr::Not(inner) => {
                f.write_str("not ")?;
                operand(f, inner)
            }
            Expr::Compare(a, op, b) => {
                comparand(f, a)?;
                write!(f, " {op} ")?;
                comparand(f, b)
            }
            Expr::In(a, items) => {
                comparand(f, a)?;
                f.write_str(" in (")?;
                list(f, items, comparand)?;
                f.write_str(")")
            }
            Expr::Function(name, args) => {
                write!(f, "{name}(")?;
                list(f, args, |f, e| write!(f, "{e}"))?;
                f.write_str(")")
            }
            Expr::Identifier(path) => write!(f, "{path}"),
            Expr::Value(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOperator {
    /// Recognize a comparison keyword (`eq`, `ne`, `gt`, `ge`, `lt`, `le`).
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "eq" => Some(CompareOperator::Eq),
            "ne" => Some(CompareOperator::Ne),
            "gt" => Some(CompareOperator::Gt),
            "ge" => Some(CompareOperator::Ge),
            "lt" => Some(CompareOperator::Lt),
            "le" => Some(CompareOperator::Le),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOperator::Eq => "eq",
            CompareOperator::Ne => "ne",
            CompareOperator::Gt => "gt",
            CompareOperator::Ge => "ge",
            CompareOperator::Lt => "lt",
            CompareOperator::Le => "le",
        }
    }
}

impl fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal values that can appear in a `$filter` expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    /// Raw content between the quotes; no escape processing is applied.
    String(String),
    /// Unquoted ISO-8601 date or date-time token.
    DateTime(DateTime<Utc>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "'{s}'"),
            Value::DateTime(dt) => f.write_str(&crate::temporal::format_timestamp(dt)),
        }
    }
}

/// A `/`-separated property path, e.g. `Address/City`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(raw.split('/').map(str::to_owned).collect())
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Walk the path through nested JSON objects.
    ///
    /// Returns `None` when a segment is missing or an intermediate value is not an
    /// object. A JSON `null` stored under the final segment is returned as-is.
    #[must_use]
    pub fn resolve<'r>(&self, record: &'r JsonValue) -> Option<&'r JsonValue> {
        self.0.iter().try_fold(record, |current, segment| {
            current.as_object().and_then(|map| map.get(segment))
        })
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
