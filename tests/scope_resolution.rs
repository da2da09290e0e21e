//! Scope and Alias Resolution Tests
//!
//! - Aliases resolve lazily and are memoized
//! - Self- and mutually-referential aliases parse in one pass
//! - Cyclic aliases without an intervening property are rejected
//! - Failed resolutions leave no partial state behind
//! - Resolved types are shared safely across threads

use std::sync::Arc;
use std::thread;

use aeroschema::{EngineConfig, Error, ParseErrorCode, ProblemCode, Scope};
use serde_json::json;

// =============================================================================
// Lazy Resolution
// =============================================================================

/// Nothing is parsed until an alias is first referenced.
#[test]
fn test_resolution_is_lazy() {
    let scope = Scope::from_value(&json!({ "a": "string", "b": "a[]" })).unwrap();
    assert!(scope.resolved_names().is_empty());

    scope.resolve("b").unwrap();
    assert_eq!(scope.resolved_names(), vec!["a".to_string(), "b".to_string()]);
}

/// Resolving twice returns the same node.
#[test]
fn test_resolution_is_memoized() {
    let scope = Scope::from_value(&json!({ "id": "string>0" })).unwrap();
    let first = scope.resolve("id").unwrap();
    let second = scope.resolve("id").unwrap();
    assert!(first.is_identical(&second));
}

/// An alias with a bad definition fails only when it is used.
#[test]
fn test_unresolvable_reference_raised_at_first_use() {
    let scope = Scope::from_value(&json!({ "good": "string", "bad": "strng" })).unwrap();
    assert!(scope.resolve("good").is_ok());

    let err = scope.resolve("bad").unwrap_err();
    assert_eq!(err.code(), ParseErrorCode::AeroSchemaUnresolvable);
    assert_eq!(err.alias(), Some("bad"));
}

/// Unknown alias names are unresolvable.
#[test]
fn test_unknown_alias() {
    let scope = Scope::empty();
    let err = scope.resolve("missing").unwrap_err();
    assert_eq!(err.code(), ParseErrorCode::AeroSchemaUnresolvable);
}

/// Eager resolution surfaces definition errors at build time.
#[test]
fn test_eager_resolution_fails_build() {
    let result = Scope::builder()
        .aliases(&json!({ "bad": "number%0" }))
        .unwrap()
        .config(EngineConfig::eager())
        .build();
    match result {
        Err(Error::Parse(err)) => assert_eq!(err.code(), ParseErrorCode::AeroSchemaInvalidDivisor),
        other => panic!("expected a parse error, got {:?}", other.map(|_| ())),
    }
}

/// Eager resolution resolves every alias up front.
#[test]
fn test_eager_resolution_resolves_all() {
    let scope = Scope::builder()
        .aliases(&json!({ "a": "string", "b": "number" }))
        .unwrap()
        .config(EngineConfig::eager())
        .build()
        .unwrap();
    assert_eq!(scope.resolved_names().len(), 2);
}

// =============================================================================
// Recursive Aliases
// =============================================================================

/// Mutually referential aliases validate through each other.
#[test]
fn test_mutual_recursion() {
    let scope = Scope::from_value(&json!({
        "tree": { "value": "number", "children": "forest" },
        "forest": "tree[]"
    }))
    .unwrap();
    let tree = scope.resolve("tree").unwrap();

    let data = json!({
        "value": 1,
        "children": [
            { "value": 2, "children": [] },
            { "value": 3, "children": [{ "value": 4, "children": [] }] }
        ]
    });
    assert!(tree.allows(&data));

    let bad = json!({ "value": 1, "children": [{ "value": "x", "children": [] }] });
    let problems = tree.apply(&bad).unwrap_err();
    assert_eq!(problems.iter().next().unwrap().path_string(), "children.0.value");
}

/// A recursive alias used inside another definition.
#[test]
fn test_recursive_alias_in_parsed_definition() {
    let scope = Scope::from_value(&json!({
        "list": { "head": "number", "tail?": "list" }
    }))
    .unwrap();
    let lists = scope.parse("list[]").unwrap();
    assert!(lists.allows(&json!([{ "head": 1, "tail": { "head": 2 } }])));
    assert!(!lists.allows(&json!([{ "head": 1, "tail": { "head": "2" } }])));
}

/// A recursive union validates nested values.
#[test]
fn test_recursive_union() {
    let scope = Scope::from_value(&json!({
        "json": ["string|number|boolean|null", "|", ["json[]", "|", { "[string]": "json" }]]
    }))
    .unwrap();
    let value = scope.resolve("json").unwrap();
    assert!(value.allows(&json!({ "a": [1, "b", { "c": null }] })));
}

// =============================================================================
// Cyclic Aliases
// =============================================================================

/// An alias that is its own operand can never consume data.
#[test]
fn test_direct_cycle_rejected() {
    let scope = Scope::from_value(&json!({ "a": "a|string" })).unwrap();
    let err = scope.resolve("a").unwrap_err();
    assert_eq!(err.code(), ParseErrorCode::AeroSchemaCyclicAlias);
}

/// Indirect cycles are rejected and nothing stays resolved.
#[test]
fn test_indirect_cycle_rolls_back() {
    let scope = Scope::from_value(&json!({ "a": "b", "b": "a", "c": "string" })).unwrap();
    let err = scope.resolve("a").unwrap_err();
    assert_eq!(err.code(), ParseErrorCode::AeroSchemaCyclicAlias);
    assert!(scope.resolved_names().is_empty());

    assert!(scope.resolve("c").is_ok());
    assert_eq!(scope.resolved_names(), vec!["c".to_string()]);
}

/// A failing parse that referenced aliases does not leave them half-resolved.
#[test]
fn test_failed_parse_rolls_back() {
    let scope = Scope::from_value(&json!({ "a": "string" })).unwrap();
    let err = scope.parse("a&number").unwrap_err();
    assert_eq!(err.code(), ParseErrorCode::AeroSchemaUnsatisfiable);
    assert!(scope.resolved_names().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

/// A resolved type validates from many threads at once.
#[test]
fn test_parallel_validation() {
    let scope = Scope::from_value(&json!({
        "user": { "name": "string", "friend?": "user" }
    }))
    .unwrap();
    let user = Arc::new(scope.resolve("user").unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let user = Arc::clone(&user);
            thread::spawn(move || {
                let good = json!({ "name": "a", "friend": { "name": format!("{}", i) } });
                let bad = json!({ "name": "a", "friend": { "name": i } });
                (user.allows(&good), user.allows(&bad))
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), (true, false));
    }
}

/// Lazy resolution from several threads converges on one node.
#[test]
fn test_parallel_resolution_converges() {
    let scope = Scope::from_value(&json!({ "id": "string", "ids": "id[]" })).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let scope = scope.clone();
            thread::spawn(move || scope.resolve("ids").unwrap())
        })
        .collect();

    let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for t in &types {
        assert!(t.is_identical(&types[0]));
    }
}

/// The hop limit is taken from the scope's config.
#[test]
fn test_depth_limit_problem() {
    let scope = Scope::builder()
        .aliases(&json!({ "chain": { "next?": "chain" } }))
        .unwrap()
        .config(EngineConfig::with_max_depth(1))
        .build()
        .unwrap();
    let chain = scope.resolve("chain").unwrap();
    assert!(chain.allows(&json!({ "next": {} })));
    let problems = chain.apply(&json!({ "next": { "next": {} } })).unwrap_err();
    assert_eq!(problems.iter().next().unwrap().code, ProblemCode::Depth);
}
