//! Non-fatal compile and maintenance diagnostics
//!
//! The compiler and the conditional engine never fail on malformed-but-survivable
//! input. Each skipped construct is logged and recorded as a [`Diagnostic`] on the
//! tree instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("Unresolvable reference '{reference}'")]
    UnresolvableRef { reference: String },

    #[error("Circular reference '{reference}'")]
    CircularRef { reference: String },

    #[error("Conditional target '{property}' not found in '{scope}'")]
    ConditionalTargetMissing { property: String, scope: String },

    #[error("Conditional on '{property}' has no const value")]
    ConditionalWithoutConst { property: String },

    #[error("Conditional on '{node}' has no group parent")]
    ConditionalOutsideGroup { node: String },

    #[error("{keyword} requires an object-shaped parent, found {parent} '{key}'")]
    SelectorOutsideGroup {
        keyword: &'static str,
        parent: &'static str,
        key: String,
    },

    #[error("Array '{array}' has no item schema")]
    MissingItemSchema { array: String },

    #[error("Maximum compile depth {depth} exceeded at '{path}'")]
    DepthExceeded { depth: usize, path: String },

    #[error("Fetching '{url}' failed: {reason}")]
    FetchFailed { url: String, reason: String },
}
