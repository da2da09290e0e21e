//! Proofs that two nodes admit no common value

use std::fmt;

use super::NodeRef;

/// Why two nodes cannot both be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisjointKind {
    /// Different domains
    Domain,
    /// Different literal values
    Unit,
    /// Size ranges do not overlap
    Range,
    /// Different class-like bases
    Basis,
    /// A literal fails a refinement
    Assignability,
    /// A key is required on one side and forbidden on the other
    Presence,
    /// Fixed tuple lengths differ
    Length,
    /// Morph pipelines cannot be combined
    Morph,
}

impl DisjointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisjointKind::Domain => "domain",
            DisjointKind::Unit => "unit",
            DisjointKind::Range => "range",
            DisjointKind::Basis => "basis",
            DisjointKind::Assignability => "assignability",
            DisjointKind::Presence => "presence",
            DisjointKind::Length => "length",
            DisjointKind::Morph => "morph",
        }
    }
}

impl fmt::Display for DisjointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One incompatible pair and where it was found.
#[derive(Debug, Clone)]
pub struct DisjointEntry {
    pub kind: DisjointKind,
    /// Structural path from the intersection root (keys and element indices)
    pub path: Vec<String>,
    pub left: NodeRef,
    pub right: NodeRef,
}

impl fmt::Display for DisjointEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Intersection")?;
        if !self.path.is_empty() {
            write!(f, " at {}", self.path.join("."))?;
        }
        write!(
            f,
            " of {} and {} results in an unsatisfiable type ({})",
            self.left.expression(),
            self.right.expression(),
            self.kind
        )
    }
}

/// Aggregated proof of emptiness.
#[derive(Debug, Clone, Default)]
pub struct Disjoint {
    entries: Vec<DisjointEntry>,
}

impl Disjoint {
    /// An accumulator with no reasons yet
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(kind: DisjointKind, left: NodeRef, right: NodeRef) -> Self {
        Self {
            entries: vec![DisjointEntry {
                kind,
                path: Vec::new(),
                left,
                right,
            }],
        }
    }

    pub fn push(&mut self, kind: DisjointKind, path: Vec<String>, left: NodeRef, right: NodeRef) {
        self.entries.push(DisjointEntry {
            kind,
            path,
            left,
            right,
        });
    }

    /// Appends every reason from `other`
    pub fn absorb(&mut self, other: Disjoint) {
        self.entries.extend(other.entries);
    }

    /// Prepends a path segment to every entry
    pub fn with_prefix(mut self, segment: &str) -> Self {
        for entry in &mut self.entries {
            entry.path.insert(0, segment.to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DisjointEntry] {
        &self.entries
    }

    /// Kind of the first reason
    pub fn kind(&self) -> Option<DisjointKind> {
        self.entries.first().map(|e| e.kind)
    }

    /// One line per reason
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Disjoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "Intersection results in an unsatisfiable type");
        }
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for Disjoint {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Domain, Interner};

    #[test]
    fn test_prefix_applies_to_every_entry() {
        let mut interner = Interner::new();
        let a = interner.domain(Domain::String);
        let b = interner.domain(Domain::Number);
        let mut disjoint = Disjoint::new(DisjointKind::Domain, a.clone(), b.clone());
        disjoint.push(DisjointKind::Unit, vec!["x".into()], a, b);
        let disjoint = disjoint.with_prefix("root");
        assert_eq!(disjoint.entries()[0].path, vec!["root"]);
        assert_eq!(disjoint.entries()[1].path, vec!["root", "x"]);
    }

    #[test]
    fn test_summary_mentions_path_and_operands() {
        let mut interner = Interner::new();
        let a = interner.domain(Domain::String);
        let b = interner.domain(Domain::Number);
        let disjoint = Disjoint::new(DisjointKind::Domain, a, b).with_prefix("name");
        let summary = disjoint.summary();
        assert!(summary.contains("at name"));
        assert!(summary.contains("string and number"));
        assert!(summary.contains("(domain)"));
    }
}
