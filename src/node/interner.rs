//! Hash-consing of nodes
//!
//! All nodes of a scope are created through its interner. A node whose id is
//! already known is dropped in favor of the existing `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use super::{BasisKind, Domain, Node, NodeId, NodeKind, NodeRef, Props, Range, UnitValue};

/// Deduplicating node store.
#[derive(Default)]
pub struct Interner {
    nodes: HashMap<NodeId, NodeRef>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared node for `kind`
    pub fn intern(&mut self, kind: NodeKind) -> NodeRef {
        let node = Node::new(kind);
        self.nodes
            .entry(node.id())
            .or_insert_with(|| Arc::new(node))
            .clone()
    }

    /// Number of distinct nodes held
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn domain(&mut self, domain: Domain) -> NodeRef {
        self.intern(NodeKind::Domain(domain))
    }

    pub fn unit(&mut self, value: UnitValue) -> NodeRef {
        self.intern(NodeKind::Unit(value))
    }

    pub fn basis(&mut self, basis: BasisKind) -> NodeRef {
        self.intern(NodeKind::Basis(basis))
    }

    pub fn bound(&mut self, range: Range) -> NodeRef {
        self.intern(NodeKind::Bound(range))
    }

    pub fn divisor(&mut self, divisor: u64) -> NodeRef {
        self.intern(NodeKind::Divisor(divisor))
    }

    pub fn brand(&mut self, name: &str) -> NodeRef {
        self.intern(NodeKind::Brand(name.to_string()))
    }

    /// The empty intersection: admits every value
    pub fn unknown(&mut self) -> NodeRef {
        self.intern(NodeKind::Intersection(Vec::new()))
    }

    /// The empty union: admits no value
    pub fn never(&mut self) -> NodeRef {
        self.intern(NodeKind::Union(Vec::new()))
    }

    /// Builds a canonical intersection from already-reduced conjuncts
    pub(crate) fn intersection(&mut self, mut children: Vec<NodeRef>) -> NodeRef {
        if children.len() == 1 {
            return children.remove(0);
        }
        children.sort_by(|a, b| {
            a.kind()
                .rank()
                .cmp(&b.kind().rank())
                .then_with(|| a.key().cmp(b.key()))
        });
        children.dedup_by(|a, b| a.id() == b.id());
        self.intern(NodeKind::Intersection(children))
    }

    /// An object-domain node constrained by `props`
    pub fn object(&mut self, props: Props) -> NodeRef {
        let domain = self.domain(Domain::Object);
        let props = self.intern(NodeKind::Props(props));
        self.intersection(vec![domain, props])
    }

    /// An array whose items all satisfy `element`
    pub fn array_of(&mut self, element: NodeRef) -> NodeRef {
        let basis = self.basis(BasisKind::Array);
        if element.is_unknown() {
            return basis;
        }
        let props = self.intern(NodeKind::Props(Props::variadic(element)));
        self.intersection(vec![basis, props])
    }
}

#[cfg(test)]
pub(crate) struct NullResolver;

#[cfg(test)]
impl super::AliasResolver for NullResolver {
    fn resolve_alias(&self, name: &str) -> crate::parser::ParseResult<NodeRef> {
        Err(crate::parser::ParseError::unresolvable(name))
    }
}
