//! # Schemaform - JSON Schema form compiler
//!
//! Schemaform compiles a JSON Schema document into a live tree of form nodes and
//! keeps that tree in sync with the schema's conditional composition (`allOf`,
//! `anyOf`, `oneOf`, `if`/`then`/`else`, `$ref`) as field values change.
//!
//! ## Features
//!
//! - **Node compiler**: fields, groups and arrays with widget kinds, options and constraints
//! - **Selectors**: radio (`oneOf`) and checkbox (`anyOf`) nodes that materialize branches
//! - **Conditional maintenance**: exact, reversible materialization with explicit observers
//! - **Patch/read**: two-phase value patching and structural read-back
//! - **Remote refs**: prefetched through a pluggable, cached schema source
//!
//! ## Quick Start
//!
//! ```rust
//! use schemaform::FormTree;
//! use serde_json::json;
//!
//! let mut tree = FormTree::compile(json!({
//!     "properties": { "country": { "enum": ["USA", "Canada"] } },
//!     "if": { "properties": { "country": { "const": "USA" } } },
//!     "then": { "properties": { "state": { "type": "string" } } }
//! }));
//!
//! let country = tree.find("country").unwrap();
//! tree.set_value(country, json!("USA")).unwrap();
//! assert!(tree.find("state").is_some());
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: node, control and error types
//! - **Engine**: the form tree and its compiler, maintenance, patch and collection logic
//! - **Adapters**: schema sources
//! - **Config**: settings and validation

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;

pub use adapters::fetch::{DisabledFetcher, HttpSchemaFetcher, SchemaFetcher, StaticSchemaFetcher};
pub use config::{CompilerSettings, Settings};
pub use domain::{
    Diagnostic, FetchError, FieldKind, FormError, FormNode, FormResult, NodeId, NodeRole,
    NodeShape, TreeEvent,
};
pub use engine::resolver::RefResolver;
pub use engine::validation::ConstraintViolation;
pub use engine::FormTree;
