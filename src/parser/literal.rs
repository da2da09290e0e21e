//! Nested literal definitions
//!
//! - string: a grammar string
//! - object: keys with `?` are optional, keys written `[K]` are index
//!   signatures, a leading `\` escapes either marker
//! - array: a tuple expression when position 1 is an operator
//!   (`[L, "|", R]`, `[L, "&", R]`, `[T, "[]"]`, `[T, "=>", morph]`,
//!   `["===", value]`), otherwise a tuple literal whose last elements may be
//!   `"...", arrayDefinition`

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::errors::{ParseError, ParseResult};
use super::state::{Parsed, Parser};
use super::Resolve;
use crate::node::{
    determinate_union, intersect, BasisKind, BuiltinMorph, IndexSignature, Morph, MorphStep, NodeKind,
    NodeRef, Props, UnitValue,
};

/// Parses a grammar string.
pub(crate) fn parse_string<R: Resolve + ?Sized>(
    definition: &str,
    ctx: &mut R,
    allow_optional: bool,
) -> ParseResult<Parsed> {
    Parser::new(definition, ctx, allow_optional).parse()
}

/// Parses a nested literal definition.
pub(crate) fn parse_literal<R: Resolve + ?Sized>(definition: &Value, ctx: &mut R) -> ParseResult<NodeRef> {
    match definition {
        Value::String(text) => Ok(parse_string(text, ctx, false)?.node),
        Value::Object(entries) => parse_object(entries, ctx),
        Value::Array(items) => parse_array(items, ctx),
        other => Err(ParseError::invalid_definition(format!(
            "{} is not a valid definition (expected a string, object or array)",
            other
        ))),
    }
}

/// Parses a property value; a string value ending in `?` is optional.
fn parse_property<R: Resolve + ?Sized>(definition: &Value, ctx: &mut R) -> ParseResult<Parsed> {
    match definition {
        Value::String(text) => parse_string(text, ctx, true),
        other => Ok(Parsed {
            node: parse_literal(other, ctx)?,
            optional: false,
        }),
    }
}

fn parse_object<R: Resolve + ?Sized>(entries: &Map<String, Value>, ctx: &mut R) -> ParseResult<NodeRef> {
    let mut required = BTreeMap::new();
    let mut optional = BTreeMap::new();
    let mut index = Vec::new();

    for (raw_key, value) in entries {
        if let Some(inner) = raw_key.strip_prefix('[').and_then(|k| k.strip_suffix(']')) {
            let key = parse_string(inner, ctx, false)?.node;
            let value = parse_literal(value, ctx)?;
            index.push(IndexSignature { key, value });
            continue;
        }

        let (key, key_optional) = match raw_key.strip_prefix('\\') {
            Some(escaped) => (escaped, false),
            None => match raw_key.strip_suffix('?') {
                Some(name) => (name, true),
                None => (raw_key.as_str(), false),
            },
        };
        let parsed = parse_property(value, ctx)?;
        if key_optional || parsed.optional {
            optional.insert(key.to_string(), parsed.node);
        } else {
            required.insert(key.to_string(), parsed.node);
        }
    }

    let props = Props {
        required,
        optional,
        index,
        sequence: None,
    }
    .normalize(ctx.interner())
    .map_err(ParseError::unsatisfiable)?;
    Ok(ctx.interner().object(props))
}

fn parse_array<R: Resolve + ?Sized>(items: &[Value], ctx: &mut R) -> ParseResult<NodeRef> {
    if let [Value::String(op), value] = items {
        if op == "===" {
            let unit = UnitValue::from_json(value).ok_or_else(|| {
                ParseError::invalid_definition(format!("{} cannot be used as a literal", value))
            })?;
            return Ok(ctx.interner().unit(unit));
        }
    }

    match items {
        [element, Value::String(op)] if op == "[]" => {
            let element = parse_literal(element, ctx)?;
            Ok(ctx.interner().array_of(element))
        }
        [left, Value::String(op), right] if op == "|" => {
            let left = parse_literal(left, ctx)?;
            let right = parse_literal(right, ctx)?;
            determinate_union(ctx.interner(), vec![left, right])
        }
        [left, Value::String(op), right] if op == "&" => {
            let left = parse_literal(left, ctx)?;
            let right = parse_literal(right, ctx)?;
            intersect(ctx.interner(), &left, &right).map_err(ParseError::unsatisfiable)
        }
        [input, Value::String(op), morph] if op == "=>" => parse_morph(input, morph, ctx),
        [_, Value::String(op), ..] if matches!(op.as_str(), "|" | "&" | "[]" | "=>") => {
            Err(ParseError::invalid_definition(format!(
                "Tuple expression with operator '{}' has the wrong number of operands",
                op
            )))
        }
        _ => parse_tuple(items, ctx),
    }
}

fn parse_morph<R: Resolve + ?Sized>(input: &Value, morph: &Value, ctx: &mut R) -> ParseResult<NodeRef> {
    let Value::String(name) = morph else {
        return Err(ParseError::invalid_definition(
            "Morph operand of '=>' must be a morph name",
        ));
    };
    let step = match ctx.morph(name) {
        Some(step) => step,
        None => BuiltinMorph::from_name(name)
            .map(MorphStep::Builtin)
            .ok_or_else(|| ParseError::unresolvable(name))?,
    };

    let input = parse_literal(input, ctx)?;
    let kind = match input.kind() {
        NodeKind::Morph(existing) => {
            let mut steps = existing.steps.clone();
            steps.push(step);
            NodeKind::Morph(Morph {
                input: existing.input.clone(),
                steps,
            })
        }
        _ => NodeKind::Morph(Morph {
            input,
            steps: vec![step],
        }),
    };
    Ok(ctx.interner().intern(kind))
}

fn parse_tuple<R: Resolve + ?Sized>(items: &[Value], ctx: &mut R) -> ParseResult<NodeRef> {
    let mut prefix = Vec::with_capacity(items.len());
    let mut variadic = None;

    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        if item.as_str() == Some("...") {
            let spread = iter.next().ok_or_else(|| {
                ParseError::invalid_definition("'...' must be followed by an array definition")
            })?;
            if iter.next().is_some() {
                return Err(ParseError::invalid_definition(
                    "A variadic element must be the last element of a tuple",
                ));
            }
            let array = parse_literal(spread, ctx)?;
            variadic = Some(variadic_element(&array, ctx)?);
            break;
        }
        prefix.push(parse_literal(item, ctx)?);
    }

    let basis = ctx.interner().basis(BasisKind::Array);
    let props = ctx.interner().intern(NodeKind::Props(Props::tuple(prefix, variadic)));
    Ok(ctx.interner().intersection(vec![basis, props]))
}

/// Element type of an array node used as a spread operand.
///
/// Only `T[]` or `Array` may be spread: a bound, brand or named key on the
/// operand would have nothing to apply to once its elements are inlined.
fn variadic_element<R: Resolve + ?Sized>(array: &NodeRef, ctx: &mut R) -> ParseResult<NodeRef> {
    let not_plain = || {
        ParseError::invalid_definition(format!(
            "Spread operand {} must be an unconstrained array definition",
            array.expression()
        ))
    };
    match array.kind() {
        NodeKind::Basis(BasisKind::Array) => Ok(ctx.interner().unknown()),
        NodeKind::Intersection(children) => {
            let mut is_array = false;
            let mut element = None;
            for child in children {
                match child.kind() {
                    NodeKind::Basis(BasisKind::Array) => is_array = true,
                    NodeKind::Props(props) if !props.has_named() => {
                        element = props
                            .sequence
                            .as_ref()
                            .filter(|sequence| sequence.prefix.is_empty())
                            .and_then(|sequence| sequence.variadic.clone());
                    }
                    _ => return Err(not_plain()),
                }
            }
            match (is_array, element) {
                (true, Some(element)) => Ok(element),
                _ => Err(not_plain()),
            }
        }
        _ => Err(not_plain()),
    }
}
