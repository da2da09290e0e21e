//! # Scope Errors

use thiserror::Error;

/// Result type for scope construction
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Errors raised while building a scope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("Invalid alias name: '{0}'")]
    InvalidAliasName(String),

    #[error("Alias already defined: '{0}'")]
    DuplicateAlias(String),

    #[error("Morph already registered: '{0}'")]
    DuplicateMorph(String),

    #[error("Scope definition must be an object of aliases (was {0})")]
    NotAnObject(String),
}

impl ScopeError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ScopeError::InvalidAliasName(_) => "AERO_SCOPE_INVALID_ALIAS_NAME",
            ScopeError::DuplicateAlias(_) => "AERO_SCOPE_DUPLICATE_ALIAS",
            ScopeError::DuplicateMorph(_) => "AERO_SCOPE_DUPLICATE_MORPH",
            ScopeError::NotAnObject(_) => "AERO_SCOPE_NOT_AN_OBJECT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ScopeError::DuplicateAlias("user".into()).code(),
            "AERO_SCOPE_DUPLICATE_ALIAS"
        );
        assert_eq!(
            ScopeError::InvalidAliasName("1x".into()).to_string(),
            "Invalid alias name: '1x'"
        );
    }
}
