//! Constraint node model
//!
//! A node is an immutable, hash-consed constraint. Every node kind is a
//! variant of the closed `NodeKind` enum and every operation (allows,
//! intersect, compile, describe) is a total function over it.
//!
//! # Identity
//!
//! - Each node has a canonical key built from its own payload and the ids of
//!   its children
//! - `NodeId` is the SHA-256 digest of that key
//! - The `Interner` returns the same `Arc` for equal ids, so structurally
//!   identical nodes built in one scope are reference-identical

mod disjoint;
mod intersect;
mod interner;
mod morph;
mod primitives;
mod props;
mod serialize;
mod union;

pub use disjoint::{Disjoint, DisjointEntry, DisjointKind};
pub use intersect::{intersect, intersect_atoms, IntersectionResult};
pub use interner::Interner;
pub use morph::{BuiltinMorph, MorphFn, MorphStep};
pub use primitives::{
    format_number, normalize_number, BasisKind, Domain, Limit, Pattern, PatternSet, Range,
    UnitValue,
};
pub use props::{IndexSignature, Props, Sequence};
pub use union::{determinate_union, union_of};

pub(crate) use serialize::{describe_range, join_or};

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::compiler::{self, Problems, Validator};
use crate::observability::{log_event_with_fields, Event};
use crate::parser::ParseResult;

/// Shared handle to an immutable node.
pub type NodeRef = Arc<Node>;

/// Content hash of a node's canonical key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 32]);

impl NodeId {
    fn digest(key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        NodeId(hasher.finalize().into())
    }

    /// Returns the first 8 bytes as hex
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

/// Resolves alias names to nodes at validation time.
pub trait AliasResolver: Send + Sync {
    fn resolve_alias(&self, name: &str) -> ParseResult<NodeRef>;
}

/// Deferred reference to a scope alias.
///
/// Created when an alias is referenced while its own definition is still
/// being parsed. The target is looked up on first validation and memoized
/// as a weak pointer so cyclic schemas do not form `Arc` cycles.
#[derive(Clone)]
pub struct AliasRef {
    name: String,
    resolver: Weak<dyn AliasResolver>,
    target: OnceLock<Weak<Node>>,
}

impl AliasRef {
    pub fn new(name: impl Into<String>, resolver: Weak<dyn AliasResolver>) -> Self {
        Self {
            name: name.into(),
            resolver,
            target: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved node for this alias
    pub fn target(&self) -> ParseResult<NodeRef> {
        if let Some(node) = self.target.get().and_then(Weak::upgrade) {
            return Ok(node);
        }
        let resolver = self
            .resolver
            .upgrade()
            .ok_or_else(|| crate::parser::ParseError::unresolvable(&self.name))?;
        let node = resolver.resolve_alias(&self.name)?;
        let _ = self.target.set(Arc::downgrade(&node));
        Ok(node)
    }
}

impl fmt::Debug for AliasRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AliasRef({})", self.name)
    }
}

/// A morph: transforms applied after `input` validates.
#[derive(Debug, Clone)]
pub struct Morph {
    pub input: NodeRef,
    pub steps: Vec<MorphStep>,
}

/// Closed set of node kinds.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Domain(Domain),
    Unit(UnitValue),
    Pattern(PatternSet),
    Bound(Range),
    Divisor(u64),
    Basis(BasisKind),
    Props(Props),
    Morph(Morph),
    /// Ordered alternatives; the empty union is `never`
    Union(Vec<NodeRef>),
    /// Simultaneous constraints in canonical order; the empty intersection is `unknown`
    Intersection(Vec<NodeRef>),
    /// Nominal marker from `#name`; admits every value
    Brand(String),
    Alias(AliasRef),
}

impl NodeKind {
    /// Sort rank inside a canonical intersection
    pub(crate) fn rank(&self) -> u8 {
        match self {
            NodeKind::Domain(_) | NodeKind::Unit(_) | NodeKind::Basis(_) => 0,
            NodeKind::Bound(_) => 1,
            NodeKind::Divisor(_) => 2,
            NodeKind::Pattern(_) => 3,
            NodeKind::Props(_) => 4,
            NodeKind::Brand(_) => 5,
            NodeKind::Alias(_) => 6,
            NodeKind::Morph(_) | NodeKind::Union(_) | NodeKind::Intersection(_) => 7,
        }
    }

    fn canonical_key(&self) -> String {
        match self {
            NodeKind::Domain(d) => format!("domain:{}", d.name()),
            NodeKind::Unit(u) => format!("unit:{}", u.expression()),
            NodeKind::Pattern(set) => {
                let sources: Vec<&str> = set.patterns().iter().map(|p| p.source()).collect();
                format!("pattern:{}", json!(sources))
            }
            NodeKind::Bound(range) => format!("bound:{}", range.key()),
            NodeKind::Divisor(d) => format!("divisor:{}", d),
            NodeKind::Basis(b) => format!("basis:{}", b.name()),
            NodeKind::Props(props) => format!("props:{}", props.key()),
            NodeKind::Morph(morph) => {
                let steps: Vec<&str> = morph.steps.iter().map(|s| s.name()).collect();
                format!("morph:{}=>{}", morph.input.id, json!(steps))
            }
            NodeKind::Union(branches) => format!("union:[{}]", join_ids(branches)),
            NodeKind::Intersection(children) => {
                format!("intersection:[{}]", join_ids(children))
            }
            NodeKind::Brand(name) => format!("brand:{}", name),
            NodeKind::Alias(alias) => format!("alias:{}", alias.name),
        }
    }

    fn has_alias(&self) -> bool {
        match self {
            NodeKind::Alias(_) => true,
            NodeKind::Props(props) => props.nodes().any(|n| n.has_alias),
            NodeKind::Morph(morph) => morph.input.has_alias,
            NodeKind::Union(nodes) | NodeKind::Intersection(nodes) => {
                nodes.iter().any(|n| n.has_alias)
            }
            _ => false,
        }
    }
}

fn join_ids(nodes: &[NodeRef]) -> String {
    nodes
        .iter()
        .map(|n| n.id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// An immutable constraint node.
pub struct Node {
    kind: NodeKind,
    id: NodeId,
    key: String,
    has_alias: bool,
    validator: OnceLock<Arc<Validator>>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        let key = kind.canonical_key();
        Self {
            id: NodeId::digest(&key),
            has_alias: kind.has_alias(),
            kind,
            key,
            validator: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Canonical key the id is derived from
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether any deferred alias is reachable from this node
    pub fn has_alias(&self) -> bool {
        self.has_alias
    }

    pub fn is_never(&self) -> bool {
        matches!(&self.kind, NodeKind::Union(branches) if branches.is_empty())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(&self.kind, NodeKind::Intersection(children) if children.is_empty())
    }

    /// Domain implied by this node's basis, if it has exactly one
    pub fn domain(&self) -> Option<Domain> {
        match &self.kind {
            NodeKind::Domain(d) => Some(*d),
            NodeKind::Unit(u) => Some(u.domain()),
            NodeKind::Basis(b) => Some(b.domain()),
            NodeKind::Intersection(children) => children.iter().find_map(|c| c.domain()),
            NodeKind::Morph(morph) => morph.input.domain(),
            _ => None,
        }
    }

    /// Basis kind of this node, if any
    pub fn basis(&self) -> Option<BasisKind> {
        match &self.kind {
            NodeKind::Basis(b) => Some(*b),
            NodeKind::Intersection(children) => children.iter().find_map(|c| c.basis()),
            _ => None,
        }
    }

    /// Union branches, or the node itself as a single branch
    pub fn branches(self: &Arc<Self>) -> Vec<NodeRef> {
        match &self.kind {
            NodeKind::Union(branches) => branches.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Conjuncts of an intersection, or the node itself
    pub fn conjuncts(self: &Arc<Self>) -> Vec<NodeRef> {
        match &self.kind {
            NodeKind::Intersection(children) => children.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Alias names reachable without descending into a property or element.
    ///
    /// A cyclic alias whose own node appears here would recurse forever at
    /// validation time without consuming data.
    pub fn shallow_references(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_shallow_references(&mut names);
        names
    }

    fn collect_shallow_references(&self, names: &mut Vec<String>) {
        match &self.kind {
            NodeKind::Alias(alias) => {
                if !names.iter().any(|n| n == alias.name()) {
                    names.push(alias.name().to_string());
                }
            }
            NodeKind::Union(nodes) | NodeKind::Intersection(nodes) => {
                for node in nodes {
                    node.collect_shallow_references(names);
                }
            }
            NodeKind::Morph(morph) => morph.input.collect_shallow_references(names),
            _ => {}
        }
    }

    /// Returns the compiled validator, building it on first use
    pub fn validator(&self) -> Arc<Validator> {
        self.validator
            .get_or_init(|| {
                let validator = Arc::new(compiler::compile(self));
                log_event_with_fields(
                    Event::ValidatorCompiled,
                    &[
                        ("checks", validator.check_count().to_string().as_str()),
                        ("node", self.id.short().as_str()),
                    ],
                );
                validator
            })
            .clone()
    }

    /// Short-circuit check of `data`
    pub fn allows(&self, data: &Value) -> bool {
        self.validator().allows(data)
    }

    /// Validates `data`, collecting every problem, and returns the morphed output
    pub fn apply(&self, data: &Value) -> Result<Value, Problems> {
        self.validator().apply(data)
    }

    /// English description of the values this node admits
    pub fn describe(&self) -> String {
        serialize::describe(self)
    }

    /// Canonical definition: a grammar string when one exists, otherwise
    /// the equivalent tuple/object form
    pub fn definition(&self) -> Value {
        serialize::definition(self)
    }

    /// Grammar string when one exists, otherwise compact JSON of the definition
    pub fn expression(&self) -> String {
        match serialize::string_form(self) {
            Some(text) => text,
            None => self.definition().to_string(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.expression())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_kinds_share_id() {
        let a = Node::new(NodeKind::Domain(Domain::String));
        let b = Node::new(NodeKind::Domain(Domain::String));
        let c = Node::new(NodeKind::Domain(Domain::Number));
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_top_and_bottom() {
        let mut interner = Interner::default();
        assert!(interner.unknown().is_unknown());
        assert!(interner.never().is_never());
        assert_eq!(interner.unknown().expression(), "unknown");
        assert_eq!(interner.never().expression(), "never");
    }

    #[test]
    fn test_shallow_references_skip_props() {
        let mut interner = Interner::default();
        let resolver: Weak<dyn AliasResolver> = Weak::<interner::NullResolver>::new();
        let alias = interner.intern(NodeKind::Alias(AliasRef::new("user", resolver)));
        let string = interner.domain(Domain::String);
        let union = union_of(&mut interner, vec![alias.clone(), string]);
        assert_eq!(union.shallow_references(), vec!["user".to_string()]);

        let props = interner.object(Props::named(vec![("friend".into(), alias, false)]));
        assert!(props.shallow_references().is_empty());
        assert!(props.has_alias());
    }
}
