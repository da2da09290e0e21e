//! Rendering nodes back to definitions and English

use serde_json::{json, Map, Value};

use super::primitives::{format_number, Domain, Range};
use super::props::Props;
use super::{BasisKind, Node, NodeKind, NodeRef};

/// Characters that force parentheses around an array element expression
const OPERATOR_CHARS: &[char] = &['|', '&', '<', '>', '=', '%', '#'];

/// Grammar string for `node`, or `None` when it needs the object/tuple form.
pub fn string_form(node: &Node) -> Option<String> {
    match node.kind() {
        NodeKind::Domain(d) => Some(d.name().to_string()),
        NodeKind::Unit(u) => Some(u.expression()),
        NodeKind::Basis(b) => Some(b.name().to_string()),
        NodeKind::Bound(range) => Some(range_fragment(range)),
        NodeKind::Divisor(d) => Some(format!("%{}", d)),
        NodeKind::Pattern(_) => Some(pattern_fragment(node)),
        NodeKind::Brand(name) => Some(format!("#{}", name)),
        NodeKind::Alias(alias) => Some(alias.name().to_string()),
        NodeKind::Props(_) | NodeKind::Morph(_) => None,
        NodeKind::Union(branches) => {
            if branches.is_empty() {
                return Some("never".to_string());
            }
            let parts: Option<Vec<String>> = branches.iter().map(|b| string_form(b)).collect();
            parts.map(|p| p.join("|"))
        }
        NodeKind::Intersection(children) => intersection_string(children),
    }
}

fn range_fragment(range: &Range) -> String {
    if let Some(exact) = range.exact() {
        return format!("=={}", format_number(exact));
    }
    let mut parts = Vec::new();
    if let Some(min) = range.min {
        parts.push(format!("{}{}", if min.exclusive { ">" } else { ">=" }, format_number(min.value)));
    }
    if let Some(max) = range.max {
        parts.push(format!("{}{}", if max.exclusive { "<" } else { "<=" }, format_number(max.value)));
    }
    parts.join("&")
}

fn pattern_fragment(node: &Node) -> String {
    match node.kind() {
        NodeKind::Pattern(set) => set
            .patterns()
            .iter()
            .map(|p| format!("/{}/", p.source()))
            .collect::<Vec<_>>()
            .join("&"),
        _ => String::new(),
    }
}

/// Applies a range to a base expression: `5<=number<10`, `string>=2`.
fn bounded(base: &str, range: &Range) -> String {
    if let Some(exact) = range.exact() {
        return format!("{}=={}", base, format_number(exact));
    }
    let mut out = String::new();
    if let (Some(min), Some(_)) = (range.min, range.max) {
        out.push_str(&format_number(min.value));
        out.push_str(if min.exclusive { "<" } else { "<=" });
        out.push_str(base);
    } else {
        out.push_str(base);
        if let Some(min) = range.min {
            out.push_str(if min.exclusive { ">" } else { ">=" });
            out.push_str(&format_number(min.value));
        }
    }
    if let Some(max) = range.max {
        out.push_str(if max.exclusive { "<" } else { "<=" });
        out.push_str(&format_number(max.value));
    }
    out
}

fn intersection_string(children: &[NodeRef]) -> Option<String> {
    if children.is_empty() {
        return Some("unknown".to_string());
    }

    let mut base: Option<String> = None;
    let mut string_domain = false;
    let mut range: Option<&Range> = None;
    let mut suffix = Vec::new();
    let mut patterns = None;

    for child in children {
        match child.kind() {
            NodeKind::Domain(d) => {
                string_domain = *d == Domain::String;
                base = Some(d.name().to_string());
            }
            NodeKind::Unit(u) => base = Some(u.expression()),
            NodeKind::Basis(b) => base = Some(b.name().to_string()),
            NodeKind::Bound(r) => range = Some(r),
            NodeKind::Divisor(d) => suffix.push(format!("%{}", d)),
            NodeKind::Pattern(_) => patterns = Some(pattern_fragment(child)),
            NodeKind::Props(props) => {
                let element = array_element(children, props)?;
                let text = string_form(element)?;
                base = Some(if text.contains(OPERATOR_CHARS) {
                    format!("({})[]", text)
                } else {
                    format!("{}[]", text)
                });
            }
            NodeKind::Brand(name) => suffix.push(format!("#{}", name)),
            NodeKind::Alias(alias) => suffix.push(format!("&{}", alias.name())),
            NodeKind::Morph(_) | NodeKind::Union(_) | NodeKind::Intersection(_) => return None,
        }
    }

    // a lone regex literal already implies the string domain
    if string_domain && range.is_none() && suffix.is_empty() {
        if let Some(patterns) = patterns {
            return Some(patterns);
        }
    }

    let mut out = match (base, range) {
        (Some(base), Some(range)) => bounded(&base, range),
        (Some(base), None) => base,
        (None, Some(range)) => range_fragment(range),
        (None, None) => String::new(),
    };
    for part in suffix {
        if out.is_empty() {
            out = part.trim_start_matches('&').to_string();
        } else {
            out.push_str(&part);
        }
    }
    if let Some(patterns) = patterns {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&patterns);
    }
    Some(out)
}

/// Element of a homogeneous array: Array basis plus a bare variadic sequence.
fn array_element<'a>(children: &[NodeRef], props: &'a Props) -> Option<&'a NodeRef> {
    let is_array = children
        .iter()
        .any(|c| matches!(c.kind(), NodeKind::Basis(BasisKind::Array)));
    if !is_array || props.has_named() {
        return None;
    }
    let sequence = props.sequence.as_ref()?;
    if !sequence.prefix.is_empty() {
        return None;
    }
    sequence.variadic.as_ref()
}

/// Canonical definition value.
pub fn definition(node: &Node) -> Value {
    if let Some(text) = string_form(node) {
        return Value::String(text);
    }
    match node.kind() {
        NodeKind::Union(branches) => chain(branches.iter().map(|b| definition(b)), "|"),
        NodeKind::Morph(morph) => morph
            .steps
            .iter()
            .fold(definition(&morph.input), |acc, step| json!([acc, "=>", step.name()])),
        NodeKind::Props(props) => props_definition(props, false),
        NodeKind::Intersection(children) => {
            let is_array = children
                .iter()
                .any(|c| matches!(c.kind(), NodeKind::Basis(BasisKind::Array)));
            let mut rest = Vec::new();
            let mut structural = None;
            for child in children {
                match child.kind() {
                    NodeKind::Props(props) => structural = Some(props_definition(props, is_array)),
                    NodeKind::Domain(Domain::Object) if !is_array => {}
                    NodeKind::Basis(BasisKind::Array) => {}
                    _ => rest.push(definition(child)),
                }
            }
            match structural {
                Some(value) => chain(std::iter::once(value).chain(rest), "&"),
                None => chain(rest.into_iter(), "&"),
            }
        }
        _ => Value::String(String::new()),
    }
}

/// Left-folds values into nested `[left, operator, right]` tuples.
fn chain(mut values: impl Iterator<Item = Value>, operator: &str) -> Value {
    let Some(first) = values.next() else {
        return Value::String(if operator == "|" { "never" } else { "unknown" }.into());
    };
    values.fold(first, |acc, next| json!([acc, operator, next]))
}

fn element_definition(element: &NodeRef) -> Value {
    match string_form(element) {
        Some(text) if text.contains(OPERATOR_CHARS) => Value::String(format!("({})[]", text)),
        Some(text) => Value::String(format!("{}[]", text)),
        None => json!([definition(element), "[]"]),
    }
}

fn props_definition(props: &Props, is_array: bool) -> Value {
    if is_array {
        if let Some(sequence) = &props.sequence {
            if sequence.prefix.is_empty() && !props.has_named() {
                if let Some(element) = &sequence.variadic {
                    return element_definition(element);
                }
            }
            let mut items: Vec<Value> = sequence.prefix.iter().map(|n| definition(n)).collect();
            if let Some(variadic) = &sequence.variadic {
                items.push(Value::String("...".into()));
                items.push(element_definition(variadic));
            }
            return Value::Array(items);
        }
    }

    let mut out = Map::new();
    for (key, value) in &props.required {
        out.insert(escape_key(key), definition(value));
    }
    for (key, value) in &props.optional {
        out.insert(format!("{}?", escape_key(key)), definition(value));
    }
    for signature in &props.index {
        out.insert(format!("[{}]", signature.key.expression()), definition(&signature.value));
    }
    Value::Object(out)
}

/// Keys that would read as optional or index keys get a leading backslash.
fn escape_key(key: &str) -> String {
    if key.ends_with('?') || key.starts_with('[') || key.starts_with('\\') {
        format!("\\{}", key)
    } else {
        key.to_string()
    }
}

/// English phrase for a range, e.g. "at least 5 and less than 10".
pub(crate) fn describe_range(range: &Range) -> String {
    if let Some(exact) = range.exact() {
        return format!("exactly {}", format_number(exact));
    }
    let mut parts = Vec::new();
    if let Some(min) = range.min {
        let word = if min.exclusive { "more than" } else { "at least" };
        parts.push(format!("{} {}", word, format_number(min.value)));
    }
    if let Some(max) = range.max {
        let word = if max.exclusive { "less than" } else { "at most" };
        parts.push(format!("{} {}", word, format_number(max.value)));
    }
    parts.join(" and ")
}

/// Joins alternatives as "a, b or c".
pub(crate) fn join_or(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

/// English description of the values `node` admits.
pub fn describe(node: &Node) -> String {
    match node.kind() {
        NodeKind::Domain(d) => d.describe().to_string(),
        NodeKind::Unit(u) => u.expression(),
        NodeKind::Basis(b) => b.describe().to_string(),
        NodeKind::Bound(range) => describe_range(range),
        NodeKind::Divisor(1) => "an integer".to_string(),
        NodeKind::Divisor(d) => format!("a multiple of {}", d),
        NodeKind::Pattern(_) => format!("matching {}", pattern_fragment(node).replace('&', " and ")),
        NodeKind::Props(props) if props.sequence.is_some() => "an array".to_string(),
        NodeKind::Props(_) => "an object".to_string(),
        NodeKind::Morph(morph) => describe(&morph.input),
        NodeKind::Union(branches) if branches.is_empty() => "nothing".to_string(),
        NodeKind::Union(branches) => {
            let parts: Vec<String> = branches.iter().map(|b| describe(b)).collect();
            join_or(&parts)
        }
        NodeKind::Intersection(children) if children.is_empty() => "anything".to_string(),
        NodeKind::Intersection(children) => describe_intersection(children),
        NodeKind::Brand(name) => format!("a value branded #{}", name),
        NodeKind::Alias(alias) => alias.name().to_string(),
    }
}

fn describe_intersection(children: &[NodeRef]) -> String {
    let mut base = String::new();
    let mut sizable = "";
    let mut tail = Vec::new();

    for child in children {
        match child.kind() {
            NodeKind::Domain(d) => {
                base = d.describe().to_string();
                if *d == Domain::String {
                    sizable = "length ";
                }
            }
            NodeKind::Unit(u) => base = u.expression(),
            NodeKind::Basis(b) => {
                base = b.describe().to_string();
                sizable = "length ";
            }
            NodeKind::Divisor(d) => {
                base = if *d == 1 {
                    "an integer".to_string()
                } else {
                    format!("a multiple of {}", d)
                };
            }
            NodeKind::Bound(range) if sizable.is_empty() => tail.push(describe_range(range)),
            NodeKind::Bound(range) => tail.push(format!("with {}{}", sizable, describe_range(range))),
            NodeKind::Pattern(_) => tail.push(describe(child)),
            NodeKind::Props(props) => {
                if base.is_empty() {
                    base = describe(child);
                }
                if let Some(element) = array_element(children, props) {
                    tail.push(format!("of {}", element.expression()));
                }
            }
            NodeKind::Brand(name) => tail.push(format!("branded #{}", name)),
            NodeKind::Alias(alias) => tail.push(format!("and {}", alias.name())),
            _ => tail.push(describe(child)),
        }
    }

    if base.is_empty() {
        return tail.join(" ");
    }
    tail.insert(0, base);
    tail.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Interner, Limit, Pattern, PatternSet, UnitValue};
    use crate::node::union_of;

    #[test]
    fn test_bounded_number_expression() {
        let mut interner = Interner::new();
        let number = interner.domain(Domain::Number);
        let bound = interner.bound(Range {
            min: Some(Limit::inclusive(5.0)),
            max: Some(Limit::exclusive(10.0)),
        });
        let node = interner.intersection(vec![number, bound]);
        assert_eq!(node.expression(), "5<=number<10");
    }

    #[test]
    fn test_regex_intersection_drops_string() {
        let mut interner = Interner::new();
        let string = interner.domain(Domain::String);
        let a = PatternSet::single(Pattern::new("a").unwrap());
        let b = PatternSet::single(Pattern::new("b").unwrap());
        let patterns = interner.intern(NodeKind::Pattern(a.union(&b)));
        let node = interner.intersection(vec![string, patterns]);
        assert_eq!(node.expression(), "/a/&/b/");
    }

    #[test]
    fn test_array_of_union_is_parenthesized() {
        let mut interner = Interner::new();
        let a = interner.unit(UnitValue::String("a".into()));
        let b = interner.unit(UnitValue::String("b".into()));
        let union = union_of(&mut interner, vec![a, b]);
        let array = interner.array_of(union);
        assert_eq!(array.expression(), "('a'|'b')[]");
    }

    #[test]
    fn test_object_definition_marks_optional_keys() {
        let mut interner = Interner::new();
        let string = interner.domain(Domain::String);
        let number = interner.domain(Domain::Number);
        let object = interner.object(Props::named(vec![
            ("name".into(), string, false),
            ("age".into(), number, true),
        ]));
        assert_eq!(
            object.definition(),
            json!({ "name": "string", "age?": "number" })
        );
    }

    #[test]
    fn test_describe_union_of_domains() {
        let mut interner = Interner::new();
        let number = interner.domain(Domain::Number);
        let string = interner.domain(Domain::String);
        let union = union_of(&mut interner, vec![number, string]);
        assert_eq!(union.describe(), "a number or a string");
    }

    #[test]
    fn test_describe_integer_and_multiple() {
        let mut interner = Interner::new();
        let number = interner.domain(Domain::Number);
        let one = interner.divisor(1);
        let six = interner.divisor(6);
        let integer = interner.intersection(vec![number.clone(), one]);
        let multiple = interner.intersection(vec![number, six]);
        assert_eq!(integer.describe(), "an integer");
        assert_eq!(multiple.describe(), "a multiple of 6");
    }
}
