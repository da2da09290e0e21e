//! Definition parser
//!
//! Turns grammar strings and nested literal definitions into nodes.
//!
//! # Components
//!
//! - `scanner`: single-token lookahead over a grammar string
//! - `state`: operand/operator state machine with group frames
//! - `literal`: object, tuple and tuple-expression definitions
//! - `keywords`: built-in identifiers
//!
//! Identifiers are resolved through a `Resolve` context (normally a scope)
//! before falling back to keywords.

mod errors;
mod keywords;
mod literal;
mod scanner;
mod state;

pub use errors::{ParseError, ParseErrorCode, ParseResult};
pub use keywords::keyword;
pub use scanner::{Comparator, Scanner, Token};

pub(crate) use literal::{parse_literal, parse_string};

use crate::node::{Interner, MorphStep, NodeRef};

/// Context consulted by the parser.
pub trait Resolve {
    /// Node store that every parsed node is created through
    fn interner(&mut self) -> &mut Interner;

    /// Resolves an alias name. `Ok(None)` lets the parser try keywords.
    fn resolve(&mut self, name: &str) -> ParseResult<Option<NodeRef>>;

    /// Custom morph registered under `name`
    fn morph(&self, _name: &str) -> Option<MorphStep> {
        None
    }
}

/// A context with no aliases, for parsing keyword-only definitions.
#[derive(Default)]
pub struct Standalone {
    interner: Interner,
}

impl Standalone {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Resolve for Standalone {
    fn interner(&mut self) -> &mut Interner {
        &mut self.interner
    }

    fn resolve(&mut self, _name: &str) -> ParseResult<Option<NodeRef>> {
        Ok(None)
    }
}
