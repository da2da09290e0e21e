//! Parse error types
//!
//! Error codes:
//! - AERO_SCHEMA_SYNTAX
//! - AERO_SCHEMA_UNRESOLVABLE
//! - AERO_SCHEMA_MISSING_OPERAND
//! - AERO_SCHEMA_UNCLOSED_GROUP
//! - AERO_SCHEMA_INVALID_DIVISOR
//! - AERO_SCHEMA_INVALID_BOUND
//! - AERO_SCHEMA_UNSATISFIABLE
//! - AERO_SCHEMA_INDETERMINATE_UNION
//! - AERO_SCHEMA_INVALID_DEFINITION
//! - AERO_SCHEMA_CYCLIC_ALIAS

use std::fmt;

use crate::node::Disjoint;

/// Parse-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorCode {
    /// Unexpected token or malformed literal
    AeroSchemaSyntax,
    /// Identifier is neither an alias nor a keyword
    AeroSchemaUnresolvable,
    /// Operator reached without an operand
    AeroSchemaMissingOperand,
    /// `(` without a matching `)` or a stray `)`
    AeroSchemaUnclosedGroup,
    /// `%` operand is not a positive integer or applied to a non-number
    AeroSchemaInvalidDivisor,
    /// Comparator misuse or bound on an unbounded type
    AeroSchemaInvalidBound,
    /// Intersection proven empty
    AeroSchemaUnsatisfiable,
    /// A morph branch overlaps another union branch
    AeroSchemaIndeterminateUnion,
    /// Nested literal shape not understood
    AeroSchemaInvalidDefinition,
    /// Alias refers to itself without an intervening property
    AeroSchemaCyclicAlias,
}

impl ParseErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ParseErrorCode::AeroSchemaSyntax => "AERO_SCHEMA_SYNTAX",
            ParseErrorCode::AeroSchemaUnresolvable => "AERO_SCHEMA_UNRESOLVABLE",
            ParseErrorCode::AeroSchemaMissingOperand => "AERO_SCHEMA_MISSING_OPERAND",
            ParseErrorCode::AeroSchemaUnclosedGroup => "AERO_SCHEMA_UNCLOSED_GROUP",
            ParseErrorCode::AeroSchemaInvalidDivisor => "AERO_SCHEMA_INVALID_DIVISOR",
            ParseErrorCode::AeroSchemaInvalidBound => "AERO_SCHEMA_INVALID_BOUND",
            ParseErrorCode::AeroSchemaUnsatisfiable => "AERO_SCHEMA_UNSATISFIABLE",
            ParseErrorCode::AeroSchemaIndeterminateUnion => "AERO_SCHEMA_INDETERMINATE_UNION",
            ParseErrorCode::AeroSchemaInvalidDefinition => "AERO_SCHEMA_INVALID_DEFINITION",
            ParseErrorCode::AeroSchemaCyclicAlias => "AERO_SCHEMA_CYCLIC_ALIAS",
        }
    }
}

impl fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Parse error with full context
#[derive(Debug, Clone)]
pub struct ParseError {
    code: ParseErrorCode,
    message: String,
    /// Alias whose definition was being parsed
    alias: Option<String>,
    /// Proof attached to unsatisfiable intersections
    disjoint: Option<Disjoint>,
}

impl ParseError {
    fn new(code: ParseErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            alias: None,
            disjoint: None,
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ParseErrorCode::AeroSchemaSyntax, message)
    }

    pub fn unresolvable(name: &str) -> Self {
        Self::new(
            ParseErrorCode::AeroSchemaUnresolvable,
            format!("'{}' is unresolvable", name),
        )
    }

    pub fn missing_operand(context: impl Into<String>) -> Self {
        Self::new(ParseErrorCode::AeroSchemaMissingOperand, context)
    }

    pub fn unclosed_group(message: impl Into<String>) -> Self {
        Self::new(ParseErrorCode::AeroSchemaUnclosedGroup, message)
    }

    pub fn invalid_divisor(message: impl Into<String>) -> Self {
        Self::new(ParseErrorCode::AeroSchemaInvalidDivisor, message)
    }

    pub fn invalid_bound(message: impl Into<String>) -> Self {
        Self::new(ParseErrorCode::AeroSchemaInvalidBound, message)
    }

    pub fn unsatisfiable(disjoint: Disjoint) -> Self {
        Self {
            code: ParseErrorCode::AeroSchemaUnsatisfiable,
            message: disjoint.to_string(),
            alias: None,
            disjoint: Some(disjoint),
        }
    }

    pub fn indeterminate_union(left: &str, right: &str) -> Self {
        Self::new(
            ParseErrorCode::AeroSchemaIndeterminateUnion,
            format!(
                "An unordered union of a type including a morph and a type with overlapping input is indeterminate: {} and {}",
                left, right
            ),
        )
    }

    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::new(ParseErrorCode::AeroSchemaInvalidDefinition, message)
    }

    pub fn cyclic_alias(name: &str) -> Self {
        Self::new(
            ParseErrorCode::AeroSchemaCyclicAlias,
            format!("Alias '{}' references itself without an intervening property", name),
        )
    }

    /// Attaches the alias being resolved, keeping an existing one
    pub fn in_alias(mut self, name: &str) -> Self {
        if self.alias.is_none() {
            self.alias = Some(name.to_string());
        }
        self
    }

    pub fn code(&self) -> ParseErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn disjoint(&self) -> Option<&Disjoint> {
        self.disjoint.as_ref()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(alias) = &self.alias {
            write!(f, " (in alias '{}')", alias)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.disjoint
            .as_ref()
            .map(|d| d as &(dyn std::error::Error + 'static))
    }
}

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ParseErrorCode::AeroSchemaSyntax.code(), "AERO_SCHEMA_SYNTAX");
        assert_eq!(
            ParseErrorCode::AeroSchemaCyclicAlias.code(),
            "AERO_SCHEMA_CYCLIC_ALIAS"
        );
    }

    #[test]
    fn test_display_includes_code_and_alias() {
        let err = ParseError::unresolvable("strng").in_alias("user");
        let display = format!("{}", err);
        assert!(display.contains("[AERO_SCHEMA_UNRESOLVABLE]"));
        assert!(display.contains("'strng'"));
        assert!(display.contains("in alias 'user'"));
    }

    #[test]
    fn test_innermost_alias_is_kept() {
        let err = ParseError::syntax("x").in_alias("inner").in_alias("outer");
        assert_eq!(err.alias(), Some("inner"));
    }
}
