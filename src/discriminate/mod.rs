//! Union discrimination
//!
//! Finds cheap checks that route data to the union branches that could
//! accept it, instead of testing every branch in turn.
//!
//! # Facts
//!
//! A branch contributes a fact `(path, kind) -> outcome` when every value it
//! admits has that outcome:
//!
//! - its domain at the root
//! - its literal value at the root
//! - recursively, the facts of its required keys
//!
//! A candidate is usable for a set of branches when every branch has a fact
//! for it and at least two outcomes differ. The candidate with the most
//! distinct outcomes wins, then the shallowest path, then discovery order.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::node::{Domain, NodeKind, NodeRef, UnitValue};

/// Which property of the data at a path is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscriminantKind {
    Domain,
    Unit,
}

impl DiscriminantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscriminantKind::Domain => "domain",
            DiscriminantKind::Unit => "unit",
        }
    }
}

/// Observed outcome of a discriminant.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Domain(Domain),
    Unit(UnitValue),
}

impl Outcome {
    /// Dispatch key: the domain name or the literal's expression
    pub fn key(&self) -> String {
        match self {
            Outcome::Domain(domain) => domain.name().to_string(),
            Outcome::Unit(unit) => unit.expression(),
        }
    }
}

/// Computes the dispatch key of `data` for a discriminant, `None` when the
/// path does not exist in the data.
pub fn observe(path: &[String], kind: DiscriminantKind, data: &Value) -> Option<String> {
    let mut current = data;
    for key in path {
        current = current.as_object()?.get(key)?;
    }
    match kind {
        DiscriminantKind::Domain => Some(Domain::of(current).name().to_string()),
        DiscriminantKind::Unit => Some(
            UnitValue::from_json(current)
                .map(|u| u.expression())
                .unwrap_or_default(),
        ),
    }
}

/// Routing decision for a set of branch indices.
#[derive(Debug, Clone)]
pub enum DecisionTree {
    /// Test the listed branches in declaration order
    Sequential(Vec<usize>),
    Switch {
        path: Vec<String>,
        kind: DiscriminantKind,
        /// Outcome and the subtree for the branches that share it
        cases: Vec<(Outcome, DecisionTree)>,
    },
}

impl DecisionTree {
    pub fn is_switch(&self) -> bool {
        matches!(self, DecisionTree::Switch { .. })
    }
}

type Candidate = (Vec<String>, DiscriminantKind);

/// Facts of one branch in discovery order.
#[derive(Debug, Default)]
struct BranchFacts {
    facts: Vec<(Candidate, Outcome)>,
}

impl BranchFacts {
    fn get(&self, candidate: &Candidate) -> Option<&Outcome> {
        self.facts
            .iter()
            .find(|(c, _)| c == candidate)
            .map(|(_, outcome)| outcome)
    }

    fn record(&mut self, path: &[String], kind: DiscriminantKind, outcome: Outcome) {
        let candidate = (path.to_vec(), kind);
        if self.get(&candidate).is_none() {
            self.facts.push((candidate, outcome));
        }
    }

    fn collect(&mut self, node: &NodeRef, path: &mut Vec<String>) {
        match node.kind() {
            NodeKind::Domain(domain) => self.record(path, DiscriminantKind::Domain, Outcome::Domain(*domain)),
            NodeKind::Basis(basis) => {
                self.record(path, DiscriminantKind::Domain, Outcome::Domain(basis.domain()))
            }
            NodeKind::Unit(unit) => {
                self.record(path, DiscriminantKind::Domain, Outcome::Domain(unit.domain()));
                self.record(path, DiscriminantKind::Unit, Outcome::Unit(unit.clone()));
            }
            NodeKind::Intersection(children) => {
                for child in children {
                    self.collect(child, path);
                }
            }
            NodeKind::Props(props) => {
                for (key, value) in &props.required {
                    path.push(key.clone());
                    self.collect(value, path);
                    path.pop();
                }
            }
            NodeKind::Morph(morph) => self.collect(&morph.input, path),
            _ => {}
        }
    }
}

/// Builds the decision tree for `branches`.
pub fn discriminate(branches: &[NodeRef]) -> DecisionTree {
    let facts: Vec<BranchFacts> = branches
        .iter()
        .map(|branch| {
            let mut facts = BranchFacts::default();
            facts.collect(branch, &mut Vec::new());
            facts
        })
        .collect();
    build(&facts, (0..branches.len()).collect(), &[])
}

fn build(facts: &[BranchFacts], indices: Vec<usize>, used: &[Candidate]) -> DecisionTree {
    if indices.len() < 2 {
        return DecisionTree::Sequential(indices);
    }
    let Some(candidate) = best_candidate(facts, &indices, used) else {
        return DecisionTree::Sequential(indices);
    };

    let mut groups: Vec<(Outcome, Vec<usize>)> = Vec::new();
    for &i in &indices {
        let Some(outcome) = facts[i].get(&candidate) else {
            continue;
        };
        match groups.iter_mut().find(|(o, _)| o.key() == outcome.key()) {
            Some((_, members)) => members.push(i),
            None => groups.push((outcome.clone(), vec![i])),
        }
    }

    let mut used = used.to_vec();
    used.push(candidate.clone());
    let cases = groups
        .into_iter()
        .map(|(outcome, members)| (outcome, build(facts, members, &used)))
        .collect();

    DecisionTree::Switch {
        path: candidate.0,
        kind: candidate.1,
        cases,
    }
}

fn best_candidate(facts: &[BranchFacts], indices: &[usize], used: &[Candidate]) -> Option<Candidate> {
    let mut best: Option<(Candidate, usize)> = None;
    for &i in indices {
        for (candidate, _) in &facts[i].facts {
            if used.contains(candidate) {
                continue;
            }
            let mut outcomes = BTreeMap::new();
            let defined_everywhere = indices.iter().all(|&j| match facts[j].get(candidate) {
                Some(outcome) => {
                    outcomes.insert(outcome.key(), ());
                    true
                }
                None => false,
            });
            if !defined_everywhere || outcomes.len() < 2 {
                continue;
            }
            let better = match &best {
                None => true,
                Some((current, distinct)) => {
                    outcomes.len() > *distinct
                        || (outcomes.len() == *distinct && candidate.0.len() < current.0.len())
                }
            };
            if better {
                best = Some((candidate.clone(), outcomes.len()));
            }
        }
    }
    best.map(|(candidate, _)| candidate)
}
