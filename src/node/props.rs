//! Structural constraints: named keys, index signatures and array sequences

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use super::disjoint::{Disjoint, DisjointKind};
use super::intersect::intersect;
use super::interner::Interner;
use super::{NodeKind, NodeRef};

/// `key -> value` constraint applied to every key admitted by `key`.
#[derive(Debug, Clone)]
pub struct IndexSignature {
    pub key: NodeRef,
    pub value: NodeRef,
}

/// Array items: positional `prefix` elements followed by an optional
/// `variadic` tail. Without a tail the array length is exactly the prefix length.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub prefix: Vec<NodeRef>,
    pub variadic: Option<NodeRef>,
}

impl Sequence {
    fn element(&self, index: usize) -> Option<&NodeRef> {
        self.prefix.get(index).or(self.variadic.as_ref())
    }

    fn fixed_len(&self) -> Option<usize> {
        match self.variadic {
            Some(_) => None,
            None => Some(self.prefix.len()),
        }
    }
}

/// Property set of an object or array node.
#[derive(Debug, Clone, Default)]
pub struct Props {
    pub required: BTreeMap<String, NodeRef>,
    pub optional: BTreeMap<String, NodeRef>,
    pub index: Vec<IndexSignature>,
    pub sequence: Option<Sequence>,
}

impl Props {
    /// Named keys as `(key, value, optional)` triples
    pub fn named(entries: Vec<(String, NodeRef, bool)>) -> Self {
        let mut props = Props::default();
        for (key, value, optional) in entries {
            props.insert(&key, value, !optional);
        }
        props
    }

    pub fn variadic(element: NodeRef) -> Self {
        Props {
            sequence: Some(Sequence {
                prefix: Vec::new(),
                variadic: Some(element),
            }),
            ..Props::default()
        }
    }

    pub fn tuple(prefix: Vec<NodeRef>, variadic: Option<NodeRef>) -> Self {
        Props {
            sequence: Some(Sequence { prefix, variadic }),
            ..Props::default()
        }
    }

    fn insert(&mut self, key: &str, value: NodeRef, required: bool) {
        if required {
            self.optional.remove(key);
            self.required.insert(key.to_string(), value);
        } else {
            self.required.remove(key);
            self.optional.insert(key.to_string(), value);
        }
    }

    /// Returns the value node of a named key and whether it is required
    pub fn get(&self, key: &str) -> Option<(&NodeRef, bool)> {
        self.required
            .get(key)
            .map(|v| (v, true))
            .or_else(|| self.optional.get(key).map(|v| (v, false)))
    }

    pub fn has_named(&self) -> bool {
        !self.required.is_empty() || !self.optional.is_empty() || !self.index.is_empty()
    }

    fn named_keys(&self) -> impl Iterator<Item = &String> {
        self.required.keys().chain(self.optional.keys())
    }

    /// Every child node
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRef> {
        let sequence = self.sequence.iter().flat_map(|s| s.prefix.iter().chain(s.variadic.iter()));
        self.required
            .values()
            .chain(self.optional.values())
            .chain(self.index.iter().flat_map(|sig| [&sig.key, &sig.value]))
            .chain(sequence)
    }

    /// Canonical payload for the node key
    pub(crate) fn key(&self) -> String {
        let mut out = Map::new();
        if !self.required.is_empty() {
            let required: Map<String, Value> = self
                .required
                .iter()
                .map(|(k, v)| (k.clone(), json!(v.id().to_string())))
                .collect();
            out.insert("required".into(), Value::Object(required));
        }
        if !self.optional.is_empty() {
            let optional: Map<String, Value> = self
                .optional
                .iter()
                .map(|(k, v)| (k.clone(), json!(v.id().to_string())))
                .collect();
            out.insert("optional".into(), Value::Object(optional));
        }
        if !self.index.is_empty() {
            let index: Vec<Value> = self
                .index
                .iter()
                .map(|sig| json!([sig.key.id().to_string(), sig.value.id().to_string()]))
                .collect();
            out.insert("index".into(), Value::Array(index));
        }
        if let Some(sequence) = &self.sequence {
            let prefix: Vec<String> = sequence.prefix.iter().map(|n| n.id().to_string()).collect();
            let variadic = sequence.variadic.as_ref().map(|n| n.id().to_string());
            out.insert("sequence".into(), json!({ "prefix": prefix, "variadic": variadic }));
        }
        Value::Object(out).to_string()
    }

    /// Narrows named keys by matching index signatures and rejects
    /// required names on an array sequence.
    pub(crate) fn normalize(mut self, interner: &mut Interner) -> Result<Props, Disjoint> {
        let mut disjoint = Disjoint::none();
        self.index.sort_by(|a, b| a.key.key().cmp(b.key.key()));

        let signatures = self.index.clone();
        for signature in signatures.iter().filter(|s| !s.key.has_alias()) {
            let keys: Vec<String> = self.named_keys().cloned().collect();
            for key in keys {
                if !signature.key.allows(&Value::String(key.clone())) {
                    continue;
                }
                let Some((value, required)) = self.get(&key).map(|(v, r)| (v.clone(), r)) else {
                    continue;
                };
                match intersect(interner, &value, &signature.value) {
                    Ok(narrowed) if narrowed.is_never() && required => disjoint.push(
                        DisjointKind::Presence,
                        vec![key.clone()],
                        value,
                        signature.value.clone(),
                    ),
                    Ok(narrowed) => self.insert(&key, narrowed, required),
                    Err(inner) if required => disjoint.absorb(inner.with_prefix(&key)),
                    Err(_) => {
                        let never = interner.never();
                        self.insert(&key, never, false);
                    }
                }
            }
        }

        if self.sequence.is_some() {
            let never = interner.never();
            for (key, value) in &self.required {
                disjoint.push(DisjointKind::Presence, vec![key.clone()], value.clone(), never.clone());
            }
        }

        if disjoint.is_empty() {
            Ok(self)
        } else {
            Err(disjoint)
        }
    }
}

/// Merges two property sets, visiting every key so that independent
/// disjoint reasons are aggregated.
pub(crate) fn intersect_props(
    interner: &mut Interner,
    left: &Props,
    right: &Props,
) -> Result<Props, Disjoint> {
    let mut out = Props::default();
    let mut disjoint = Disjoint::none();

    let keys: BTreeSet<&String> = left.named_keys().chain(right.named_keys()).collect();
    for key in keys {
        match (left.get(key), right.get(key)) {
            (Some((value, required)), None) | (None, Some((value, required))) => {
                out.insert(key, value.clone(), required);
            }
            (Some((a, a_required)), Some((b, b_required))) => {
                let required = a_required || b_required;
                match intersect(interner, a, b) {
                    Ok(value) if value.is_never() && required => disjoint.push(
                        DisjointKind::Presence,
                        vec![key.clone()],
                        a.clone(),
                        b.clone(),
                    ),
                    Ok(value) => out.insert(key, value, required),
                    Err(_) if !required => {
                        let never = interner.never();
                        out.insert(key, never, false);
                    }
                    Err(inner) if a_required && b_required => {
                        disjoint.absorb(inner.with_prefix(key));
                    }
                    Err(_) => disjoint.push(
                        DisjointKind::Presence,
                        vec![key.clone()],
                        a.clone(),
                        b.clone(),
                    ),
                }
            }
            (None, None) => {}
        }
    }

    let mut index = left.index.clone();
    for signature in &right.index {
        match index.iter_mut().find(|s| s.key.id() == signature.key.id()) {
            Some(existing) => {
                existing.value = match intersect(interner, &existing.value, &signature.value) {
                    Ok(value) => value,
                    Err(_) => interner.never(),
                };
            }
            None => index.push(signature.clone()),
        }
    }
    out.index = index;

    out.sequence = match (&left.sequence, &right.sequence) {
        (Some(a), Some(b)) => match intersect_sequences(interner, a, b) {
            Ok(sequence) => Some(sequence),
            Err(inner) => {
                disjoint.absorb(inner);
                None
            }
        },
        (a, b) => a.clone().or_else(|| b.clone()),
    };

    if !disjoint.is_empty() {
        return Err(disjoint);
    }
    out.normalize(interner)
}

fn intersect_sequences(
    interner: &mut Interner,
    left: &Sequence,
    right: &Sequence,
) -> Result<Sequence, Disjoint> {
    let length_mismatch = match (left.fixed_len(), right.fixed_len()) {
        (Some(n), Some(m)) => n != m,
        (Some(n), None) => right.prefix.len() > n,
        (None, Some(m)) => left.prefix.len() > m,
        (None, None) => false,
    };
    if length_mismatch {
        let l = interner.intern(NodeKind::Props(Props::tuple(
            left.prefix.clone(),
            left.variadic.clone(),
        )));
        let r = interner.intern(NodeKind::Props(Props::tuple(
            right.prefix.clone(),
            right.variadic.clone(),
        )));
        return Err(Disjoint::new(DisjointKind::Length, l, r));
    }

    let len = left
        .fixed_len()
        .or(right.fixed_len())
        .unwrap_or_else(|| left.prefix.len().max(right.prefix.len()));

    let mut disjoint = Disjoint::none();
    let mut prefix = Vec::with_capacity(len);
    for i in 0..len {
        let (Some(a), Some(b)) = (left.element(i), right.element(i)) else {
            continue;
        };
        match intersect(interner, a, b) {
            Ok(element) if element.is_never() => disjoint.push(
                DisjointKind::Presence,
                vec![i.to_string()],
                a.clone(),
                b.clone(),
            ),
            Ok(element) => prefix.push(element),
            Err(inner) => disjoint.absorb(inner.with_prefix(&i.to_string())),
        }
    }
    if !disjoint.is_empty() {
        return Err(disjoint);
    }

    let variadic = match (&left.variadic, &right.variadic) {
        (Some(a), Some(b)) => Some(match intersect(interner, a, b) {
            Ok(element) => element,
            Err(_) => interner.never(),
        }),
        _ => None,
    };
    Ok(Sequence { prefix, variadic })
}
