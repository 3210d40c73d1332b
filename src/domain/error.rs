//! Caller-visible error types

use thiserror::Error;

use super::node::NodeId;

/// Errors returned by the public tree API
#[derive(Debug, Error)]
pub enum FormError {
    /// Node id is not (or no longer) part of the tree
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Operation applied to a node of another shape
    #[error("Node '{key}' is a {actual}, expected a {expected}")]
    WrongShape {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Schema source failure
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FormResult<T> = Result<T, FormError>;

/// Errors raised by schema sources
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid schema URL '{0}'")]
    InvalidUrl(String),

    #[error("HTTP error fetching '{url}': {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status} fetching '{url}'")]
    Status { url: String, status: u16 },

    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Schema fetching is disabled")]
    Disabled,
}
