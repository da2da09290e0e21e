//! Node-to-validator compiler
//!
//! A node tree is walked once and lowered into a `Program`: a flat list of
//! primitive checks per data path. Validation then runs the program instead
//! of re-interpreting the tree.
//!
//! # Elision
//!
//! The compiler tracks what is already known about each path (domain,
//! literal value, basis). A check implied by a known fact is not emitted;
//! discriminated union branches are compiled knowing the outcome that routed
//! data to them.
//!
//! # Modes
//!
//! - `allows`: stops at the first failure
//! - `apply`: collects every problem and returns the morphed data

mod problems;
mod runtime;

pub use problems::{PathSegment, Problem, ProblemCode, Problems};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::discriminate::{discriminate, DecisionTree, DiscriminantKind, Outcome};
use crate::node::{
    AliasRef, BasisKind, Domain, MorphStep, Node, NodeKind, NodeRef, PatternSet, Range, UnitValue,
};
use crate::observability::{log_event_with_fields, Event};

/// What a bound measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dimension {
    /// Numeric value
    Value,
    /// String length in chars
    Chars,
    /// Array item count
    Items,
    /// Decided by the data's type at run time
    Dynamic,
}

/// Primitive check over the data at the current path.
#[derive(Debug)]
pub(crate) enum Check {
    Domain(Domain),
    Unit(UnitValue),
    Basis(BasisKind),
    Range { range: Range, dimension: Dimension },
    Divisor(u64),
    Pattern(PatternSet),
    Key {
        key: String,
        required: bool,
        program: Program,
    },
    /// Applies to keys not declared as named keys
    Index {
        key: Program,
        value: Program,
        named: Vec<String>,
    },
    Elements {
        prefix: Vec<Program>,
        variadic: Option<Program>,
    },
    Union {
        dispatch: Dispatch,
        /// Every branch, for sequential fallback when a discriminant path is absent
        fallback: Arc<[Program]>,
        expected: Arc<str>,
    },
    Alias(AliasRef),
    Morph {
        input: Program,
        steps: Arc<[MorphStep]>,
    },
    Never,
}

/// Compiled union routing.
#[derive(Debug)]
pub(crate) enum Dispatch {
    Sequential(Arc<[Program]>),
    Switch {
        path: Vec<String>,
        kind: DiscriminantKind,
        cases: HashMap<String, Dispatch>,
        expected: String,
    },
}

/// Checks for one data path. Shared, so traversal frames can hold
/// sub-programs without borrowing from their parents.
#[derive(Debug, Clone)]
pub(crate) struct Program {
    pub checks: Arc<[Check]>,
}

impl Program {
    fn new(checks: Vec<Check>) -> Self {
        Self {
            checks: checks.into(),
        }
    }

    fn count(&self) -> usize {
        self.checks.iter().map(Check::count).sum()
    }
}

impl Check {
    fn count(&self) -> usize {
        1 + match self {
            Check::Key { program, .. } => program.count(),
            Check::Index { key, value, .. } => key.count() + value.count(),
            Check::Elements { prefix, variadic } => {
                prefix.iter().map(Program::count).sum::<usize>()
                    + variadic.as_ref().map_or(0, Program::count)
            }
            Check::Union { dispatch, .. } => dispatch.count(),
            Check::Morph { input, .. } => input.count(),
            _ => 0,
        }
    }
}

impl Dispatch {
    fn count(&self) -> usize {
        match self {
            Dispatch::Sequential(programs) => programs.iter().map(Program::count).sum(),
            Dispatch::Switch { cases, .. } => cases.values().map(Dispatch::count).sum(),
        }
    }
}

/// Facts already established about a path.
#[derive(Debug, Clone, Default)]
struct Known {
    domain: Option<Domain>,
    unit: Option<UnitValue>,
    basis: Option<BasisKind>,
    keys: BTreeMap<String, Known>,
}

impl Known {
    fn at(&mut self, path: &[String]) -> &mut Known {
        match path.split_first() {
            None => self,
            Some((head, rest)) => self.keys.entry(head.clone()).or_default().at(rest),
        }
    }

    fn key(&self, key: &str) -> Known {
        self.keys.get(key).cloned().unwrap_or_default()
    }

    fn implies_domain(&self, domain: Domain) -> bool {
        self.domain == Some(domain)
            || self.unit.as_ref().is_some_and(|u| u.domain() == domain)
            || self.basis.is_some_and(|b| b.domain() == domain)
    }
}

/// A compiled, reusable validator for one node.
#[derive(Debug)]
pub struct Validator {
    program: Program,
    checks: usize,
}

impl Validator {
    /// Short-circuit check
    pub fn allows(&self, data: &Value) -> bool {
        self.allows_with_depth(data, None)
    }

    /// Collects every problem; returns the morphed data on success
    pub fn apply(&self, data: &Value) -> Result<Value, Problems> {
        self.apply_with_depth(data, None)
    }

    /// `max_depth` caps nested alias hops; `None` leaves descent bounded
    /// only by the data.
    pub fn allows_with_depth(&self, data: &Value, max_depth: Option<usize>) -> bool {
        runtime::Traversal::new(runtime::Mode::Allows, max_depth)
            .run(&self.program, data)
            .is_some()
    }

    pub fn apply_with_depth(&self, data: &Value, max_depth: Option<usize>) -> Result<Value, Problems> {
        let mut traversal = runtime::Traversal::new(runtime::Mode::Apply, max_depth);
        match traversal.run(&self.program, data) {
            Some(output) if traversal.problems.is_empty() => Ok(output.into_owned()),
            _ => Err(Problems::from(std::mem::take(&mut traversal.problems))),
        }
    }

    /// Number of primitive checks emitted
    pub fn check_count(&self) -> usize {
        self.checks
    }

    pub(crate) fn program(&self) -> &Program {
        &self.program
    }
}

/// Compiles a node into its validator.
pub fn compile(node: &Node) -> Validator {
    let mut checks = Vec::new();
    lower(node, &Known::default(), &mut checks);
    let program = Program::new(checks);
    Validator {
        checks: program.count(),
        program,
    }
}

fn lower_node(node: &NodeRef, known: &Known) -> Program {
    let mut checks = Vec::new();
    lower(node, known, &mut checks);
    Program::new(checks)
}

/// Emits the checks for `node` into `program`.
fn lower(node: &Node, known: &Known, program: &mut Vec<Check>) {
    match node.kind() {
        NodeKind::Intersection(children) => {
            let dimension = dimension_of(node, known);
            let mut known = known.clone();
            for child in children {
                lower_atom(child, &mut known, dimension, program);
            }
        }
        NodeKind::Union(branches) if branches.is_empty() => program.push(Check::Never),
        NodeKind::Union(branches) => program.push(lower_union(node, branches, known)),
        NodeKind::Morph(morph) => program.push(Check::Morph {
            input: lower_node(&morph.input, known),
            steps: morph.steps.clone().into(),
        }),
        _ => {
            let dimension = dimension_of(node, known);
            let mut known = known.clone();
            lower_atom(node, &mut known, dimension, program);
        }
    }
}

/// Bound dimension from the basis of the enclosing intersection.
fn dimension_of(node: &Node, known: &Known) -> Dimension {
    let basis = node.basis().or(known.basis);
    let domain = node.domain().or(known.domain);
    match (basis, domain) {
        (Some(BasisKind::Array), _) => Dimension::Items,
        (Some(BasisKind::Date), _) | (None, Some(Domain::String)) => Dimension::Chars,
        (None, Some(Domain::Number)) => Dimension::Value,
        _ => Dimension::Dynamic,
    }
}

fn lower_atom(node: &Node, known: &mut Known, dimension: Dimension, program: &mut Vec<Check>) {
    match node.kind() {
        NodeKind::Domain(domain) => {
            if !known.implies_domain(*domain) {
                program.push(Check::Domain(*domain));
                known.domain = Some(*domain);
            }
        }
        NodeKind::Unit(unit) => {
            if known.unit.as_ref() != Some(unit) {
                program.push(Check::Unit(unit.clone()));
                known.unit = Some(unit.clone());
            }
        }
        NodeKind::Basis(basis) => {
            if known.basis != Some(*basis) {
                program.push(Check::Basis(*basis));
                known.basis = Some(*basis);
            }
        }
        NodeKind::Bound(range) => program.push(Check::Range {
            range: *range,
            dimension,
        }),
        NodeKind::Divisor(divisor) => program.push(Check::Divisor(*divisor)),
        NodeKind::Pattern(set) => program.push(Check::Pattern(set.clone())),
        NodeKind::Props(props) => {
            for (key, value) in &props.required {
                program.push(Check::Key {
                    key: key.clone(),
                    required: true,
                    program: lower_node(value, &known.key(key)),
                });
            }
            for (key, value) in &props.optional {
                program.push(Check::Key {
                    key: key.clone(),
                    required: false,
                    program: lower_node(value, &known.key(key)),
                });
            }
            for signature in &props.index {
                program.push(Check::Index {
                    key: lower_node(&signature.key, &Known::default()),
                    value: lower_node(&signature.value, &Known::default()),
                    named: props.required.keys().chain(props.optional.keys()).cloned().collect(),
                });
            }
            if let Some(sequence) = &props.sequence {
                program.push(Check::Elements {
                    prefix: sequence
                        .prefix
                        .iter()
                        .map(|n| lower_node(n, &Known::default()))
                        .collect(),
                    variadic: sequence
                        .variadic
                        .as_ref()
                        .map(|n| lower_node(n, &Known::default())),
                });
            }
        }
        NodeKind::Brand(_) => {}
        NodeKind::Alias(alias) => program.push(Check::Alias(alias.clone())),
        NodeKind::Union(_) | NodeKind::Intersection(_) | NodeKind::Morph(_) => {
            lower(node, known, program)
        }
    }
}

fn lower_union(node: &Node, branches: &[NodeRef], known: &Known) -> Check {
    let tree = discriminate(branches);
    if let DecisionTree::Switch { path, kind, cases } = &tree {
        log_event_with_fields(
            Event::UnionDiscriminated,
            &[
                ("branches", branches.len().to_string().as_str()),
                ("kind", kind.as_str()),
                ("path", path.join(".").as_str()),
                ("cases", cases.len().to_string().as_str()),
            ],
        );
    }
    Check::Union {
        dispatch: lower_tree(&tree, branches, known),
        fallback: branches.iter().map(|b| lower_node(b, known)).collect(),
        expected: node.describe().into(),
    }
}

fn lower_tree(tree: &DecisionTree, branches: &[NodeRef], known: &Known) -> Dispatch {
    match tree {
        DecisionTree::Sequential(indices) => Dispatch::Sequential(
            indices
                .iter()
                .map(|&i| lower_node(&branches[i], known))
                .collect(),
        ),
        DecisionTree::Switch { path, kind, cases } => {
            let expected = crate::node::join_or(
                &cases
                    .iter()
                    .map(|(outcome, _)| match outcome {
                        Outcome::Domain(domain) => domain.describe().to_string(),
                        Outcome::Unit(unit) => unit.expression(),
                    })
                    .collect::<Vec<_>>(),
            );
            let lowered = cases
                .iter()
                .map(|(outcome, subtree)| {
                    let mut known = known.clone();
                    let at = known.at(path);
                    match outcome {
                        Outcome::Domain(domain) => at.domain = Some(*domain),
                        Outcome::Unit(unit) => at.unit = Some(unit.clone()),
                    }
                    (outcome.key(), lower_tree(subtree, branches, &known))
                })
                .collect();
            Dispatch::Switch {
                path: path.clone(),
                kind: *kind,
                cases: lowered,
                expected,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_literal, parse_string, Standalone};
    use serde_json::json;

    fn node(definition: &str) -> NodeRef {
        parse_string(definition, &mut Standalone::new(), false).unwrap().node
    }

    #[test]
    fn test_domain_mismatch_message() {
        let problems = node("number|string").apply(&json!(true)).unwrap_err();
        assert_eq!(problems.len(), 1);
        let problem = problems.iter().next().unwrap();
        assert_eq!(problem.code, ProblemCode::Domain);
        assert!(problem.path.is_empty());
        assert_eq!(problem.message, "must be a number or a string (was boolean)");
    }

    #[test]
    fn test_unit_elided_inside_discriminated_branch() {
        let validator = compile(&node("'a'|'b'"));
        match &validator.program().checks[..] {
            [Check::Union { dispatch: Dispatch::Switch { cases, .. }, .. }] => {
                for case in cases.values() {
                    match case {
                        Dispatch::Sequential(programs) => assert!(programs[0].checks.is_empty()),
                        other => panic!("unexpected {:?}", other),
                    }
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_range_dimension_follows_basis() {
        let strings = node("string>=2");
        assert!(strings.allows(&json!("ab")));
        assert!(!strings.allows(&json!("a")));
        let arrays = node("number[]<2");
        assert!(arrays.allows(&json!([1])));
        assert!(!arrays.allows(&json!([1, 2])));
    }

    #[test]
    fn test_apply_collects_every_problem() {
        let mut ctx = Standalone::new();
        let object = parse_literal(&json!({ "a": "string", "b": "number%2", "c": "boolean" }), &mut ctx).unwrap();
        let problems = object.apply(&json!({ "a": 1, "b": 3 })).unwrap_err();
        assert_eq!(problems.len(), 3);
        assert_eq!(problems.at("a")[0].code, ProblemCode::Domain);
        assert_eq!(problems.at("b")[0].message, "must be a multiple of 2 (was 3)");
        assert_eq!(problems.at("c")[0].code, ProblemCode::Missing);
    }

    #[test]
    fn test_index_signature_checks_undeclared_keys() {
        let mut ctx = Standalone::new();
        let object = parse_literal(&json!({ "id": "string", "[/^x-/]": "number" }), &mut ctx).unwrap();
        assert!(object.allows(&json!({ "id": "x", "x-count": 1 })));
        assert!(object.allows(&json!({ "id": "x", "other": "z" })));
        assert!(!object.allows(&json!({ "id": "x", "x-count": "1" })));
    }

    #[test]
    fn test_morph_output_is_returned() {
        let mut ctx = Standalone::new();
        let object = parse_literal(&json!({ "age": "parse.integer" }), &mut ctx).unwrap();
        assert_eq!(object.apply(&json!({ "age": "42" })).unwrap(), json!({ "age": 42 }));
        let problems = object.apply(&json!({ "age": "x" })).unwrap_err();
        assert_eq!(problems.at("age")[0].code, ProblemCode::Morph);
    }

    #[test]
    fn test_never_rejects_everything() {
        assert!(!node("never").allows(&json!(null)));
        assert!(node("unknown").allows(&json!(null)));
    }
}
