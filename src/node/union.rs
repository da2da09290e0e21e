//! Union construction
//!
//! Branches are flattened, deduplicated by id and reduced: a branch that is
//! a subtype of another kept branch adds nothing and is dropped.
//!
//! Unions written by users must also be determinate: a morph branch may not
//! share an input value with another branch, or which one transforms that
//! value would depend on branch order.

use super::intersect::intersect;
use super::interner::Interner;
use super::{NodeKind, NodeRef};
use crate::parser::{ParseError, ParseResult};

/// Builds the reduced union of `branches`.
///
/// Zero surviving branches yield `never`, one yields that branch.
pub fn union_of(interner: &mut Interner, branches: Vec<NodeRef>) -> NodeRef {
    let mut flat: Vec<NodeRef> = Vec::new();
    for branch in branches {
        for node in branch.branches() {
            if !flat.iter().any(|existing| existing.id() == node.id()) {
                flat.push(node);
            }
        }
    }

    let mut kept: Vec<NodeRef> = Vec::with_capacity(flat.len());
    for (i, branch) in flat.iter().enumerate() {
        let subsumed = !is_morph(branch)
            && flat.iter().enumerate().any(|(j, other)| {
                j != i
                    && !is_morph(other)
                    && is_subtype(interner, branch, other)
                    && (j < i || !is_subtype(interner, other, branch))
            });
        if !subsumed {
            kept.push(branch.clone());
        }
    }

    match kept.len() {
        0 => interner.never(),
        1 => kept.remove(0),
        _ => interner.intern(NodeKind::Union(kept)),
    }
}

/// Builds the reduced union of `branches`, failing when it is indeterminate.
pub fn determinate_union(interner: &mut Interner, branches: Vec<NodeRef>) -> ParseResult<NodeRef> {
    let union = union_of(interner, branches);
    let kept = union.branches();
    for (i, left) in kept.iter().enumerate() {
        for right in &kept[i + 1..] {
            if (is_morph(left) || is_morph(right)) && overlaps(interner, left, right) {
                return Err(ParseError::indeterminate_union(
                    &left.expression(),
                    &right.expression(),
                ));
            }
        }
    }
    Ok(union)
}

/// Some input value satisfies both branches. Overlap through an unresolved
/// alias cannot be decided at parse time and is allowed.
fn overlaps(interner: &mut Interner, left: &NodeRef, right: &NodeRef) -> bool {
    let left = morph_input(left);
    let right = morph_input(right);
    matches!(intersect(interner, &left, &right), Ok(both) if !both.has_alias())
}

fn morph_input(node: &NodeRef) -> NodeRef {
    match node.kind() {
        NodeKind::Morph(morph) => morph.input.clone(),
        _ => node.clone(),
    }
}

fn is_morph(node: &NodeRef) -> bool {
    matches!(node.kind(), NodeKind::Morph(_))
}

/// `sub` admits no value outside `sup`
fn is_subtype(interner: &mut Interner, sub: &NodeRef, sup: &NodeRef) -> bool {
    matches!(intersect(interner, sub, sup), Ok(node) if node.id() == sub.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BuiltinMorph, Domain, Morph, MorphStep, UnitValue};
    use crate::parser::ParseErrorCode;

    #[test]
    fn test_empty_union_is_never() {
        let mut interner = Interner::new();
        assert!(union_of(&mut interner, Vec::new()).is_never());
    }

    #[test]
    fn test_single_branch_is_returned() {
        let mut interner = Interner::new();
        let string = interner.domain(Domain::String);
        let union = union_of(&mut interner, vec![string.clone(), string.clone()]);
        assert_eq!(union.id(), string.id());
    }

    #[test]
    fn test_literal_absorbed_by_domain() {
        let mut interner = Interner::new();
        let t = interner.unit(UnitValue::Boolean(true));
        let boolean = interner.domain(Domain::Boolean);
        let union = union_of(&mut interner, vec![t, boolean.clone()]);
        assert_eq!(union.id(), boolean.id());
    }

    #[test]
    fn test_nested_unions_flatten() {
        let mut interner = Interner::new();
        let string = interner.domain(Domain::String);
        let number = interner.domain(Domain::Number);
        let null = interner.unit(UnitValue::Null);
        let inner = union_of(&mut interner, vec![string, number]);
        let outer = union_of(&mut interner, vec![inner, null]);
        assert_eq!(outer.branches().len(), 3);
    }

    #[test]
    fn test_overlapping_morph_branch_is_indeterminate() {
        let mut interner = Interner::new();
        let string = interner.domain(Domain::String);
        let parse_number = interner.intern(NodeKind::Morph(Morph {
            input: string.clone(),
            steps: vec![MorphStep::Builtin(BuiltinMorph::ParseNumber)],
        }));
        let err = determinate_union(&mut interner, vec![string, parse_number.clone()]).unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::AeroSchemaIndeterminateUnion);

        let number = interner.domain(Domain::Number);
        let union = determinate_union(&mut interner, vec![parse_number, number]).unwrap();
        assert_eq!(union.branches().len(), 2);
    }

    #[test]
    fn test_unknown_absorbs_everything() {
        let mut interner = Interner::new();
        let string = interner.domain(Domain::String);
        let unknown = interner.unknown();
        let union = union_of(&mut interner, vec![string, unknown.clone()]);
        assert!(union.is_unknown());
    }
}
