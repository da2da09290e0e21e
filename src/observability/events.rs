//! Observable schema engine events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Scope lifecycle
    /// Scope constructed from its alias table
    ScopeBuilt,

    // Alias resolution
    /// Parsing of an alias definition started
    AliasResolveBegin,
    /// Alias definition parsed into a node
    AliasResolved,
    /// Alias referenced while still being resolved; left as a deferred reference
    AliasDeferred,
    /// Alias definition failed to parse
    AliasResolveFailed,

    // Compilation
    /// A node's validator was compiled
    ValidatorCompiled,
    /// A union was compiled into a discriminated switch
    UnionDiscriminated,

    // Parsing
    /// A definition was rejected
    ParseFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ScopeBuilt => "SCOPE_BUILT",
            Event::AliasResolveBegin => "ALIAS_RESOLVE_BEGIN",
            Event::AliasResolved => "ALIAS_RESOLVED",
            Event::AliasDeferred => "ALIAS_DEFERRED",
            Event::AliasResolveFailed => "ALIAS_RESOLVE_FAILED",
            Event::ValidatorCompiled => "VALIDATOR_COMPILED",
            Event::UnionDiscriminated => "UNION_DISCRIMINATED",
            Event::ParseFailed => "PARSE_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ScopeBuilt => Severity::Info,
            Event::AliasResolveFailed | Event::ParseFailed => Severity::Warn,
            _ => Severity::Trace,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_unique() {
        let events = [
            Event::ScopeBuilt,
            Event::AliasResolveBegin,
            Event::AliasResolved,
            Event::AliasDeferred,
            Event::AliasResolveFailed,
            Event::ValidatorCompiled,
            Event::UnionDiscriminated,
            Event::ParseFailed,
        ];
        let mut names: Vec<&str> = events.iter().map(|e| e.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), events.len());
    }

    #[test]
    fn test_failures_are_warnings() {
        assert_eq!(Event::ParseFailed.severity(), Severity::Warn);
        assert_eq!(Event::AliasResolved.severity(), Severity::Trace);
    }
}
