//! Mapping from query errors to [`Problem`] (pure data)
//!
//! Hosts that run the pipeline with [`crate::OnFilterError::Propagate`] convert
//! the returned error here and attach their own instance path before responding.

use http::StatusCode;

use crate::Error;
use crate::problem::Problem;

const PROBLEM_TYPE_BASE: &str = "https://errors.cyberfabric.io/odata";

impl From<Error> for Problem {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidFilter(msg) => Problem::new(
                StatusCode::BAD_REQUEST,
                "Invalid Filter",
                format!("Invalid $filter: {msg}"),
            )
            .with_type(format!("{PROBLEM_TYPE_BASE}/invalid-filter"))
            .with_code("odata.invalid_filter"),

            Error::Config(msg) => {
                tracing::error!(error = %msg, "OData query engine misconfigured");
                Problem::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "An internal error occurred while processing the OData query",
                )
                .with_type(format!("{PROBLEM_TYPE_BASE}/internal"))
                .with_code("odata.internal")
            }
        }
    }
}
