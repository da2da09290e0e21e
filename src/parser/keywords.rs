//! Built-in keywords
//!
//! Identifiers that resolve without a scope alias. Aliases shadow keywords.

use crate::node::{
    BasisKind, BuiltinMorph, Domain, Interner, Morph, MorphStep, NodeKind, NodeRef, Pattern,
    PatternSet, UnitValue,
};

/// Keyword names and the regex each string keyword requires
const PATTERN_KEYWORDS: &[(&str, &str)] = &[
    ("email", r"^(.+)@(.+)\.(.+)$"),
    (
        "uuid",
        r"^[\da-fA-F]{8}-[\da-fA-F]{4}-[\da-fA-F]{4}-[\da-fA-F]{4}-[\da-fA-F]{12}$",
    ),
    ("alpha", r"^[A-Za-z]*$"),
    ("alphanumeric", r"^[A-Za-z\d]*$"),
    ("digits", r"^\d*$"),
    ("lowercase", r"^[a-z]*$"),
    ("uppercase", r"^[A-Z]*$"),
    (
        "semver",
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    ),
];

/// Builds the node for a keyword
pub fn keyword(interner: &mut Interner, name: &str) -> Option<NodeRef> {
    if let Some(domain) = Domain::from_keyword(name) {
        return Some(interner.domain(domain));
    }
    let node = match name {
        "null" => interner.unit(UnitValue::Null),
        "true" => interner.unit(UnitValue::Boolean(true)),
        "false" => interner.unit(UnitValue::Boolean(false)),
        "unknown" | "any" => interner.unknown(),
        "never" => interner.never(),
        "integer" => {
            let number = interner.domain(Domain::Number);
            let divisor = interner.divisor(1);
            interner.intersection(vec![number, divisor])
        }
        "Array" => interner.basis(BasisKind::Array),
        "Date" => interner.basis(BasisKind::Date),
        _ => {
            if let Some((_, source)) = PATTERN_KEYWORDS.iter().find(|(k, _)| *k == name) {
                return pattern_node(interner, source);
            }
            let builtin = BuiltinMorph::from_name(name)?;
            let input = interner.domain(Domain::String);
            interner.intern(NodeKind::Morph(Morph {
                input,
                steps: vec![MorphStep::Builtin(builtin)],
            }))
        }
    };
    Some(node)
}

/// `string` narrowed by one regex
pub(crate) fn pattern_node(interner: &mut Interner, source: &str) -> Option<NodeRef> {
    let pattern = Pattern::new(source).ok()?;
    let string = interner.domain(Domain::String);
    let pattern = interner.intern(NodeKind::Pattern(PatternSet::single(pattern)));
    Some(interner.intersection(vec![string, pattern]))
}
