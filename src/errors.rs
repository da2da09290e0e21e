//! # Crate Errors
//!
//! One error type for callers that do not care which stage failed.

use thiserror::Error;

use crate::compiler::Problems;
use crate::node::Disjoint;
use crate::parser::ParseError;
use crate::scope::ScopeError;

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by the engine
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("Unsatisfiable intersection: {0}")]
    Unsatisfiable(#[from] Disjoint),

    #[error("{0}")]
    Validation(#[from] Problems),
}

impl Error {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse(err) => err.code().code(),
            Error::Scope(err) => err.code(),
            Error::Unsatisfiable(_) => "AERO_SCHEMA_UNSATISFIABLE",
            Error::Validation(_) => "AERO_SCHEMA_VALIDATION_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: Error = ParseError::unresolvable("x").into();
        assert_eq!(err.code(), "AERO_SCHEMA_UNRESOLVABLE");
        let err: Error = ScopeError::NotAnObject("5".into()).into();
        assert_eq!(err.code(), "AERO_SCOPE_NOT_AN_OBJECT");
        let err: Error = Problems::new().into();
        assert_eq!(err.code(), "AERO_SCHEMA_VALIDATION_FAILED");
    }
}
