//! aeroschema - A runtime schema engine
//!
//! Parses compact string (or nested literal) definitions into immutable
//! constraint nodes, validates JSON data against them and computes
//! intersections, unions and disjointness between schemas.
//!
//! # Pipeline
//!
//! scanner -> parser -> node model (intersection algebra) -> discriminator
//! -> compiler -> validator
//!
//! Aliases are resolved through a `Scope`, lazily and with support for
//! self- and mutually-referential definitions.

pub mod compiler;
pub mod config;
pub mod discriminate;
pub mod errors;
pub mod node;
pub mod observability;
pub mod parser;
pub mod scope;

pub use compiler::{PathSegment, Problem, ProblemCode, Problems, Validator};
pub use config::EngineConfig;
pub use errors::{Error, Result};
pub use node::{Disjoint, DisjointKind, Node, NodeKind, NodeRef};
pub use parser::{ParseError, ParseErrorCode, ParseResult};
pub use scope::{Scope, ScopeBuilder, ScopeError, Type};

use serde_json::Value;

/// Parses a grammar string in `scope`
pub fn parse(definition: &str, scope: &Scope) -> ParseResult<Type> {
    scope.parse(definition)
}

/// Parses a nested literal definition in `scope`
pub fn parse_value(definition: &Value, scope: &Scope) -> ParseResult<Type> {
    scope.parse_value(definition)
}
