//! Intersection algebra
//!
//! `intersect` combines two nodes into the narrowest node admitting exactly
//! the values both admit, or proves that no such value exists.
//!
//! - Unions distribute; branches that become disjoint are dropped
//! - Morphs narrow their input
//! - Everything else is reduced conjunct by conjunct with `intersect_atoms`

use super::disjoint::{Disjoint, DisjointKind};
use super::interner::Interner;
use super::primitives::{Domain, UnitValue};
use super::props::intersect_props;
use super::union::union_of;
use super::{Morph, NodeKind, NodeRef};

/// Outcome of combining two atomic constraints.
#[derive(Debug)]
pub enum IntersectionResult {
    /// The pair reduces to one node
    Node(NodeRef),
    /// No value satisfies both
    Disjoint(Disjoint),
    /// Both must be kept as a conjunction
    Irreducible,
}

/// Intersects two nodes.
///
/// `Disjoint` is absorbing: once a reason is found the caller gets it back,
/// never a partial node.
pub fn intersect(interner: &mut Interner, left: &NodeRef, right: &NodeRef) -> Result<NodeRef, Disjoint> {
    if left.id() == right.id() {
        return Ok(left.clone());
    }
    if left.is_never() || right.is_never() {
        return Ok(interner.never());
    }
    match (left.kind(), right.kind()) {
        (NodeKind::Union(_), _) | (_, NodeKind::Union(_)) => distribute(interner, left, right),
        (NodeKind::Morph(a), NodeKind::Morph(b)) => {
            if a.steps != b.steps {
                return Err(Disjoint::new(DisjointKind::Morph, left.clone(), right.clone()));
            }
            let input = intersect(interner, &a.input, &b.input)?;
            Ok(morph(interner, input, a))
        }
        (NodeKind::Morph(m), _) => {
            let input = intersect(interner, &m.input, right)?;
            Ok(morph(interner, input, m))
        }
        (_, NodeKind::Morph(m)) => {
            let input = intersect(interner, left, &m.input)?;
            Ok(morph(interner, input, m))
        }
        _ => {
            let mut conjuncts = left.conjuncts();
            for incoming in right.conjuncts() {
                conjuncts = add_conjunct(interner, conjuncts, incoming)?;
            }
            Ok(interner.intersection(conjuncts))
        }
    }
}

fn morph(interner: &mut Interner, input: NodeRef, template: &Morph) -> NodeRef {
    if input.is_never() {
        return input;
    }
    interner.intern(NodeKind::Morph(Morph {
        input,
        steps: template.steps.clone(),
    }))
}

/// Distributes over union branches in a canonical pairing order so that
/// `intersect(a, b)` and `intersect(b, a)` build the same union.
fn distribute(interner: &mut Interner, left: &NodeRef, right: &NodeRef) -> Result<NodeRef, Disjoint> {
    let (outer, inner) = if left.key() <= right.key() {
        (left.branches(), right.branches())
    } else {
        (right.branches(), left.branches())
    };

    let mut results = Vec::new();
    let mut disjoint = Disjoint::none();
    for a in &outer {
        for b in &inner {
            match intersect(interner, a, b) {
                Ok(node) if node.is_never() => {}
                Ok(node) => results.push(node),
                Err(reason) => disjoint.absorb(reason),
            }
        }
    }
    if results.is_empty() {
        return Err(disjoint);
    }
    Ok(union_of(interner, results))
}

/// Adds one conjunct, merging it with any existing conjunct it reduces with.
fn add_conjunct(
    interner: &mut Interner,
    mut conjuncts: Vec<NodeRef>,
    incoming: NodeRef,
) -> Result<Vec<NodeRef>, Disjoint> {
    for i in 0..conjuncts.len() {
        match intersect_atoms(interner, &conjuncts[i], &incoming) {
            IntersectionResult::Disjoint(reason) => return Err(reason),
            IntersectionResult::Node(merged) => {
                conjuncts.remove(i);
                return add_conjunct(interner, conjuncts, merged);
            }
            IntersectionResult::Irreducible => {}
        }
    }
    conjuncts.push(incoming);
    Ok(conjuncts)
}

/// Domains a refinement can apply to; `None` for non-refinements.
fn refinement_domains(kind: &NodeKind) -> Option<&'static [Domain]> {
    match kind {
        NodeKind::Bound(_) => Some(&[Domain::Number, Domain::String, Domain::Object]),
        NodeKind::Divisor(_) => Some(&[Domain::Number]),
        NodeKind::Pattern(_) => Some(&[Domain::String]),
        NodeKind::Props(_) => Some(&[Domain::Object]),
        _ => None,
    }
}

/// Whether a unit satisfies a refinement of a compatible domain.
fn unit_satisfies(unit: &UnitValue, refinement: &NodeKind) -> bool {
    match (refinement, unit) {
        (NodeKind::Bound(range), _) => unit.size().is_some_and(|size| range.allows(size)),
        (NodeKind::Divisor(divisor), UnitValue::Number(n)) => n
            .as_f64()
            .is_some_and(|value| value % (*divisor as f64) == 0.0),
        (NodeKind::Pattern(set), UnitValue::String(s)) => set.is_match(s),
        _ => false,
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Pairwise rule over atomic kinds. Composite kinds defer to `intersect`.
pub fn intersect_atoms(interner: &mut Interner, left: &NodeRef, right: &NodeRef) -> IntersectionResult {
    use IntersectionResult::{Irreducible, Node};
    use NodeKind as K;

    if left.id() == right.id() {
        return Node(left.clone());
    }
    let disjoint = |kind| IntersectionResult::Disjoint(Disjoint::new(kind, left.clone(), right.clone()));

    match (left.kind(), right.kind()) {
        (K::Union(_) | K::Intersection(_) | K::Morph(_), _)
        | (_, K::Union(_) | K::Intersection(_) | K::Morph(_)) => {
            match intersect(interner, left, right) {
                Ok(node) => Node(node),
                Err(reason) => IntersectionResult::Disjoint(reason),
            }
        }
        (K::Brand(_) | K::Alias(_), _) | (_, K::Brand(_) | K::Alias(_)) => Irreducible,

        (K::Domain(_), K::Domain(_)) => disjoint(DisjointKind::Domain),
        (K::Unit(a), K::Unit(b)) => {
            if a == b {
                Node(left.clone())
            } else {
                disjoint(DisjointKind::Unit)
            }
        }
        (K::Unit(u), K::Domain(d)) | (K::Domain(d), K::Unit(u)) => {
            if u.domain() == *d {
                Node(if matches!(left.kind(), K::Unit(_)) { left.clone() } else { right.clone() })
            } else {
                disjoint(DisjointKind::Domain)
            }
        }
        (K::Unit(u), K::Basis(b)) | (K::Basis(b), K::Unit(u)) => {
            if u.domain() != b.domain() {
                disjoint(DisjointKind::Domain)
            } else if b.allows_unit(u) {
                Node(if matches!(left.kind(), K::Unit(_)) { left.clone() } else { right.clone() })
            } else {
                disjoint(DisjointKind::Assignability)
            }
        }
        (K::Domain(d), K::Basis(b)) | (K::Basis(b), K::Domain(d)) => {
            if b.domain() == *d {
                Node(if matches!(left.kind(), K::Basis(_)) { left.clone() } else { right.clone() })
            } else {
                disjoint(DisjointKind::Domain)
            }
        }
        (K::Basis(a), K::Basis(b)) => {
            if a.domain() != b.domain() {
                disjoint(DisjointKind::Domain)
            } else {
                disjoint(DisjointKind::Basis)
            }
        }

        (K::Bound(a), K::Bound(b)) => match a.intersect(b) {
            Some(range) => Node(interner.bound(range)),
            None => disjoint(DisjointKind::Range),
        },
        (K::Divisor(a), K::Divisor(b)) => match (a / gcd(*a, *b)).checked_mul(*b) {
            Some(lcm) => Node(interner.divisor(lcm)),
            None => Irreducible,
        },
        (K::Pattern(a), K::Pattern(b)) => Node(interner.intern(K::Pattern(a.union(b)))),
        (K::Props(a), K::Props(b)) => match intersect_props(interner, a, b) {
            Ok(props) => Node(interner.intern(K::Props(props))),
            Err(reason) => IntersectionResult::Disjoint(reason),
        },

        (K::Domain(d), refinement) | (refinement, K::Domain(d)) => match refinement_domains(refinement) {
            Some(domains) if domains.contains(d) => Irreducible,
            _ => disjoint(DisjointKind::Domain),
        },
        (K::Basis(b), refinement) | (refinement, K::Basis(b)) => match refinement_domains(refinement) {
            Some(domains) if domains.contains(&b.domain()) => Irreducible,
            _ => disjoint(DisjointKind::Domain),
        },
        (K::Unit(u), refinement) | (refinement, K::Unit(u)) => match refinement_domains(refinement) {
            Some(domains) if domains.contains(&u.domain()) => {
                if unit_satisfies(u, refinement) {
                    Node(if matches!(left.kind(), K::Unit(_)) { left.clone() } else { right.clone() })
                } else {
                    disjoint(DisjointKind::Assignability)
                }
            }
            _ => disjoint(DisjointKind::Domain),
        },

        (a, b) => match (refinement_domains(a), refinement_domains(b)) {
            (Some(x), Some(y)) if x.iter().any(|d| y.contains(d)) => Irreducible,
            _ => disjoint(DisjointKind::Domain),
        },
    }
}
