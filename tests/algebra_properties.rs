//! Intersection Algebra Property Tests
//!
//! Checks the algebraic laws over generated definitions and values, with a
//! fixed corpus kept as regression seeds:
//! - Idempotence: A & A is A
//! - Commutativity: A & B and B & A agree
//! - Soundness: A & B admits exactly what both admit
//! - Disjointness: a disjoint pair shares no value and carries a reason
//! - Round-trip: re-parsing an expression or definition yields the same node
//! - Discrimination: routed unions agree with sequential testing

use aeroschema::{Scope, Type};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use serde_json::{json, Map, Value};

// =============================================================================
// Seed Corpus
// =============================================================================

const STRING_DEFINITIONS: &[&str] = &[
    "string",
    "number",
    "boolean",
    "null",
    "'a'",
    "'b'",
    "5",
    "number%2",
    "number%3",
    "0<number<10",
    "number>=5",
    "string>2",
    "string<=4",
    "/^a/",
    "string[]",
    "number[]",
    "(string|number)[]",
    "string|number",
    "'a'|'b'|number",
    "integer",
    "email",
    "Date",
    "unknown",
    "never",
    "true|false",
];

fn literal_definitions() -> Vec<Value> {
    vec![
        json!({ "a": "string" }),
        json!({ "a": "number", "b?": "string" }),
        json!({ "b?": "string" }),
        json!(["string", "number"]),
        json!(["string", "...", "number[]"]),
        json!([{ "kind": "'x'", "n": "number" }, "|", { "kind": "'y'", "s": "string" }]),
    ]
}

fn samples() -> Vec<Value> {
    vec![
        json!(0),
        json!(1),
        json!(2),
        json!(3),
        json!(5),
        json!(6),
        json!(7.5),
        json!(12),
        json!(-3),
        json!(""),
        json!("a"),
        json!("b"),
        json!("abc"),
        json!("abcdef"),
        json!("x@y.z"),
        json!("2024-01-01T00:00:00Z"),
        json!(true),
        json!(false),
        json!(null),
        json!([]),
        json!(["a"]),
        json!([1, 2]),
        json!(["a", 1]),
        json!(["a", 1, 2]),
        json!([1, "a"]),
        json!({}),
        json!({ "a": "x" }),
        json!({ "a": 1 }),
        json!({ "a": 1, "b": "s" }),
        json!({ "a": 1, "b": 2 }),
        json!({ "kind": "x", "n": 1 }),
        json!({ "kind": "y", "s": "t" }),
        json!({ "kind": "y", "n": 1 }),
    ]
}

fn corpus(scope: &Scope) -> Vec<Type> {
    let mut types: Vec<Type> = STRING_DEFINITIONS
        .iter()
        .map(|d| scope.parse(d).unwrap())
        .collect();
    types.extend(literal_definitions().iter().map(|d| scope.parse_value(d).unwrap()));
    types
}

// =============================================================================
// Strategies
// =============================================================================

fn arb_domain() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["string", "number", "boolean", "null", "unknown", "integer"])
        .prop_map(String::from)
}

fn arb_unit() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..13).prop_map(|n| n.to_string()),
        prop::sample::select(vec!["'a'", "'b'", "'abc'", "'x'", "true", "false"]).prop_map(String::from),
    ]
}

fn arb_comparator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![">", ">=", "<", "<="])
}

fn arb_bound() -> impl Strategy<Value = String> {
    prop_oneof![
        (arb_comparator(), 0u32..10).prop_map(|(op, n)| format!("number{}{}", op, n)),
        (0u32..10, 1u32..10).prop_map(|(lo, width)| format!("{}<number<{}", lo, lo + width)),
        (arb_comparator(), 1u32..5).prop_map(|(op, n)| format!("string{}{}", op, n)),
    ]
}

fn arb_divisor() -> impl Strategy<Value = String> {
    (2u32..6).prop_map(|d| format!("number%{}", d))
}

fn arb_pattern() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["/^a/", "/b$/", "/^[a-c]*$/", "email", "digits", "lowercase"])
        .prop_map(String::from)
}

fn arb_bounded_array() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["string", "number", "boolean"]),
        prop::sample::select(vec!["<", ">=", "<="]),
        1u32..4,
    )
        .prop_map(|(element, op, n)| format!("{}[]{}{}", element, op, n))
}

/// Grammar strings: atoms combined by `|` and `[]`.
fn arb_string_definition() -> BoxedStrategy<String> {
    prop_oneof![
        arb_domain(),
        arb_unit(),
        arb_bound(),
        arb_divisor(),
        arb_pattern(),
        arb_bounded_array(),
    ]
    .prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{}|{}", a, b)),
            inner.prop_map(|element| format!("({})[]", element)),
        ]
    })
    .boxed()
}

fn arb_object(inner: BoxedStrategy<Value>) -> impl Strategy<Value = Value> {
    prop::collection::btree_map(
        prop::sample::select(vec!["a", "b", "kind", "n"]),
        (any::<bool>(), inner),
        0..3,
    )
    .prop_map(|entries| {
        let object: Map<String, Value> = entries
            .into_iter()
            .map(|(key, (optional, value))| {
                let key = if optional { format!("{}?", key) } else { key.to_string() };
                (key, value)
            })
            .collect();
        Value::Object(object)
    })
}

/// Nested literal definitions: grammar strings, objects, tuples, unions and arrays.
fn arb_definition() -> BoxedStrategy<Value> {
    arb_string_definition()
        .prop_map(Value::String)
        .prop_recursive(2, 12, 3, |inner| {
            prop_oneof![
                arb_object(inner.clone()),
                prop::collection::vec(inner.clone(), 1..3).prop_map(Value::Array),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| json!([a, "|", b])),
                inner.prop_map(|element| json!([element, "[]"])),
            ]
        })
        .boxed()
}

/// Unions of objects tagged by a `kind` literal, in the shape routing expects.
fn arb_tagged_union() -> impl Strategy<Value = Value> {
    prop::collection::vec(
        (prop::sample::select(vec!["'x'", "'y'", "'z'"]), arb_string_definition()),
        2..4,
    )
    .prop_map(|branches| {
        branches
            .into_iter()
            .map(|(tag, n)| json!({ "kind": tag, "n": n }))
            .reduce(|acc, branch| json!([acc, "|", branch]))
            .unwrap()
    })
}

fn arb_leaf_sample() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-5i64..20).prop_map(Value::from),
        (-5i64..20).prop_map(|n| Value::from(n as f64 + 0.5)),
        "[abxyz@.]{0,5}".prop_map(Value::String),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

/// JSON values shaped to hit the generated definitions often.
fn arb_sample() -> BoxedStrategy<Value> {
    let nested = arb_leaf_sample().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("(a|b|kind|n)", inner, 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    });
    prop_oneof![
        3 => nested,
        1 => (prop::sample::select(vec!["x", "y", "z", "w"]), arb_leaf_sample())
            .prop_map(|(kind, n)| json!({ "kind": kind, "n": n })),
    ]
    .boxed()
}

fn arb_samples() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(arb_sample(), 1..12)
}

// =============================================================================
// Laws
// =============================================================================

type LawResult = Result<(), TestCaseError>;

/// Intersecting a type with itself serializes identically.
fn idempotent(t: &Type) -> LawResult {
    let same = t
        .intersect(t)
        .map_err(|err| TestCaseError::fail(format!("{} & itself is disjoint: {}", t, err.summary())))?;
    prop_assert_eq!(same.expression(), t.expression(), "{} & itself", t);
    Ok(())
}

/// `A & B` and `B & A` are both disjoint or serialize identically.
fn commutative(a: &Type, b: &Type) -> LawResult {
    match (a.intersect(b), b.intersect(a)) {
        (Ok(ab), Ok(ba)) => {
            prop_assert_eq!(ab.expression(), ba.expression(), "{} & {}", a, b);
        }
        (Err(_), Err(_)) => {}
        (ab, ba) => {
            return Err(TestCaseError::fail(format!(
                "{} & {} gave {:?} but reversed gave {:?}",
                a, b, ab, ba
            )))
        }
    }
    Ok(())
}

/// An intersection admits exactly the values both operands admit; a
/// disjoint pair admits none in common and says why.
fn sound(a: &Type, b: &Type, values: &[Value]) -> LawResult {
    match a.intersect(b) {
        Ok(both) => {
            for value in values {
                prop_assert_eq!(
                    both.allows(value),
                    a.allows(value) && b.allows(value),
                    "({}) & ({}) on {}",
                    a,
                    b,
                    value
                );
            }
        }
        Err(err) => {
            prop_assert!(!err.is_empty());
            prop_assert!(!err.summary().is_empty());
            for value in values {
                prop_assert!(
                    !(a.allows(value) && b.allows(value)),
                    "{} and {} are disjoint but both allow {}",
                    a,
                    b,
                    value
                );
            }
        }
    }
    Ok(())
}

/// Re-parsing the expression yields the same node.
fn expression_round_trips(scope: &Scope, t: &Type) -> LawResult {
    let again = scope
        .parse(&t.expression())
        .map_err(|err| TestCaseError::fail(format!("{} does not re-parse: {}", t.expression(), err)))?;
    prop_assert_eq!(again, t.clone(), "{}", t.expression());
    Ok(())
}

/// Re-parsing the definition yields the same node.
fn definition_round_trips(scope: &Scope, t: &Type) -> LawResult {
    let definition = t.definition();
    let again = scope
        .parse_value(&definition)
        .map_err(|err| TestCaseError::fail(format!("{} does not re-parse: {}", definition, err)))?;
    prop_assert_eq!(again, t.clone(), "{}", definition);
    Ok(())
}

/// A union allows and applies a value iff some branch allows it.
fn routes_like_sequential(union: &Type, values: &[Value]) -> LawResult {
    let branches = union.node().branches();
    for value in values {
        let sequential = branches.iter().any(|b| b.allows(value));
        prop_assert_eq!(union.allows(value), sequential, "{} on {}", union, value);
        prop_assert_eq!(union.apply(value).is_ok(), sequential, "{} on {}", union, value);
    }
    Ok(())
}

// =============================================================================
// Generated Cases
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn intersection_is_idempotent(definition in arb_definition()) {
        let scope = Scope::empty();
        let t = scope.parse_value(&definition).unwrap();
        idempotent(&t)?;
    }

    #[test]
    fn intersection_is_commutative(left in arb_definition(), right in arb_definition()) {
        let scope = Scope::empty();
        let a = scope.parse_value(&left).unwrap();
        let b = scope.parse_value(&right).unwrap();
        commutative(&a, &b)?;
    }

    #[test]
    fn intersection_is_sound(
        left in arb_definition(),
        right in arb_definition(),
        values in arb_samples(),
    ) {
        let scope = Scope::empty();
        let a = scope.parse_value(&left).unwrap();
        let b = scope.parse_value(&right).unwrap();
        sound(&a, &b, &values)?;
    }

    #[test]
    fn expression_round_trip(definition in arb_string_definition()) {
        let scope = Scope::empty();
        let t = scope.parse(&definition).unwrap();
        expression_round_trips(&scope, &t)?;
    }

    #[test]
    fn definition_round_trip(definition in arb_definition()) {
        let scope = Scope::empty();
        let t = scope.parse_value(&definition).unwrap();
        definition_round_trips(&scope, &t)?;
    }

    #[test]
    fn union_routes_like_sequential(definition in arb_definition(), values in arb_samples()) {
        let scope = Scope::empty();
        let t = scope.parse_value(&definition).unwrap();
        routes_like_sequential(&t, &values)?;
    }

    #[test]
    fn tagged_union_routes_like_sequential(definition in arb_tagged_union(), values in arb_samples()) {
        let scope = Scope::empty();
        let t = scope.parse_value(&definition).unwrap();
        routes_like_sequential(&t, &values)?;
    }
}

// =============================================================================
// Seed Cases
// =============================================================================

#[test]
fn test_seed_intersection_is_idempotent() {
    let scope = Scope::empty();
    for t in corpus(&scope) {
        idempotent(&t).unwrap();
    }
}

#[test]
fn test_seed_intersection_is_commutative() {
    let scope = Scope::empty();
    let types = corpus(&scope);
    for a in &types {
        for b in &types {
            commutative(a, b).unwrap();
        }
    }
}

#[test]
fn test_seed_intersection_is_sound() {
    let scope = Scope::empty();
    let types = corpus(&scope);
    let samples = samples();
    for a in &types {
        for b in &types {
            sound(a, b, &samples).unwrap();
        }
    }
}

#[test]
fn test_seed_round_trips() {
    let scope = Scope::empty();
    for definition in STRING_DEFINITIONS {
        let t = scope.parse(definition).unwrap();
        expression_round_trips(&scope, &t).unwrap();
    }
    for definition in literal_definitions() {
        let t = scope.parse_value(&definition).unwrap();
        definition_round_trips(&scope, &t).unwrap();
    }
}

#[test]
fn test_seed_discriminated_union_matches_sequential() {
    let scope = Scope::empty();
    let unions: Vec<Type> = corpus(&scope)
        .into_iter()
        .filter(|t| t.node().branches().len() > 1)
        .collect();
    assert!(!unions.is_empty());

    let samples = samples();
    for union in &unions {
        routes_like_sequential(union, &samples).unwrap();
    }
}
