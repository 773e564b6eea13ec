//! Input validation and safety limits for `OData` query evaluation
//!
//! This module enforces sane caps to prevent abuse and resource exhaustion:
//! - Maximum filter expression length
//! - Maximum AST node count and nesting depth of a parsed filter
//! - Optional server-side page size cap

use serde::{Deserialize, Serialize};

use crate::Error;

/// Default configuration for `OData` input limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ODataLimits {
    /// Maximum length of $filter expression in bytes (default: 2000)
    pub max_filter_length: usize,
    /// Maximum number of AST nodes in a parsed $filter (default: 2000)
    pub max_nodes: usize,
    /// Maximum nesting of parentheses, calls, `not` and `and`/`or` chain terms (default: 64)
    pub max_depth: usize,
    /// Server-driven page size; caps `$top` when set (default: none)
    pub max_top: Option<usize>,
}

impl Default for ODataLimits {
    fn default() -> Self {
        Self {
            max_filter_length: 2000,
            max_nodes: 2000,
            max_depth: 64,
            max_top: None,
        }
    }
}

impl ODataLimits {
    /// Create limits with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum $filter length
    #[must_use]
    pub fn with_max_filter_length(mut self, max: usize) -> Self {
        self.max_filter_length = max;
        self
    }

    /// Set maximum AST node count
    #[must_use]
    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    /// Set maximum nesting depth
    #[must_use]
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Cap every page at `max_top` records
    #[must_use]
    pub fn with_max_top(mut self, max_top: usize) -> Self {
        self.max_top = Some(max_top);
        self
    }

    /// Validate a $filter expression length
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] if the filter is longer than `max_filter_length`.
    pub fn validate_filter(&self, filter: &str) -> Result<(), Error> {
        if filter.len() > self.max_filter_length {
            return Err(Error::InvalidFilter(format!(
                "Filter expression exceeds maximum length of {} characters",
                self.max_filter_length
            )));
        }
        Ok(())
    }

    /// Validate the node count of a parsed $filter
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] if `node_count` exceeds `max_nodes`.
    pub fn validate_node_count(&self, node_count: usize) -> Result<(), Error> {
        if node_count > self.max_nodes {
            return Err(Error::InvalidFilter(format!(
                "Filter too complex: {node_count} nodes (max: {})",
                self.max_nodes
            )));
        }
        Ok(())
    }

    /// Page size after applying the server cap to the requested `$top`.
    #[must_use]
    pub fn effective_top(&self, requested: Option<usize>) -> Option<usize> {
        match (requested, self.max_top) {
            (Some(top), Some(max)) => Some(top.min(max)),
            (top, max) => top.or(max),
        }
    }
}
