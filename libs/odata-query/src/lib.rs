#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! In-memory `OData` query engine.
//!
//! Turns a flat query-option map into [`QueryOptions`], parses `$filter` into an
//! [`ast::Expr`], and shapes a materialized collection of JSON records through the
//! fixed stage order filter → order → paginate → project → expand, finally wrapping
//! the page in an [`Envelope`].
//!
//! ```rust,ignore
//! use odata_query::{decode_query_string, run_pipeline};
//!
//! let options = decode_query_string("$filter=price gt 10&$orderby=name desc&$top=5");
//! let page = run_pipeline(&records, &options);
//! ```
pub mod ast;
pub mod config;
pub mod envelope;
pub mod eval;
pub mod functions;
mod lexer;
pub mod limits;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod problem;
pub mod problem_mapping;
pub mod scanner;
mod temporal;

pub use config::{OnFilterError, QueryConfig};
pub use envelope::{Envelope, build_envelope, next_page_link};
pub use eval::{Evaluator, Operand};
pub use functions::{BuiltinFn, FunctionTable};
pub use limits::ODataLimits;
pub use options::{ExpandItem, QueryOptions, decode_options, decode_query_string};
pub use parser::{ParsedFilter, parse_filter_string, parse_filter_with_limits};
pub use pipeline::{Pipeline, order, paginate, project, run_pipeline};
pub use problem::Problem;

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    /// Parse a direction token; `desc` (any case) is descending, anything else ascending.
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some(t) if t.eq_ignore_ascii_case("desc") => SortDir::Desc,
            _ => SortDir::Asc,
        }
    }

    /// Apply this direction to an ascending comparison result.
    #[must_use]
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    /// Property path, `/`-separated.
    pub field: String,
    pub dir: SortDir,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ODataOrderBy(pub Vec<OrderKey>);

impl ODataOrderBy {
    pub fn empty() -> Self {
        Self(vec![])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[OrderKey] {
        &self.0
    }
}

// Display trait for human-readable orderby representation
impl std::fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }

        let formatted: Vec<String> = self
            .0
            .iter()
            .map(|key| {
                let dir_str = match key.dir {
                    SortDir::Asc => "asc",
                    SortDir::Desc => "desc",
                };
                format!("{} {}", key.field, dir_str)
            })
            .collect();

        write!(f, "{}", formatted.join(", "))
    }
}

/// Unified error type for all `OData` query operations.
///
/// Decoding never fails, so only two classes reach callers:
/// - `InvalidFilter` is a client error (malformed `$filter`, or one exceeding [`ODataLimits`]).
///   It only escapes the pipeline under [`OnFilterError::Propagate`].
/// - `Config` is raised while loading [`QueryConfig`].
///
/// ## HTTP Mapping
///
/// See [`problem_mapping`]: `InvalidFilter` → 400, `Config` → 500.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid $filter: {0}")]
    InvalidFilter(String),

    #[error("invalid OData query configuration: {0}")]
    Config(String),
}
