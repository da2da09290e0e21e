//! Atomic constraint values carried by nodes
//!
//! - Domain: coarse runtime category of a JSON value
//! - UnitValue: a single literal value
//! - Range/Limit: size bounds (numeric value, string length, array length)
//! - BasisKind: class-like bases (arrays, date strings)
//! - PatternSet: conjunctive set of regular expressions

use std::cmp::Ordering;
use std::fmt;

use chrono::DateTime;
use regex::Regex;
use serde_json::{Number, Value};

/// Coarse runtime category of data.
///
/// JSON arrays belong to the `object` domain; the `Array` basis narrows
/// them further. `bigint` exists only at the grammar level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    BigInt,
    Boolean,
    Null,
    Number,
    Object,
    String,
}

impl Domain {
    /// Returns the keyword naming this domain
    pub fn name(&self) -> &'static str {
        match self {
            Domain::BigInt => "bigint",
            Domain::Boolean => "boolean",
            Domain::Null => "null",
            Domain::Number => "number",
            Domain::Object => "object",
            Domain::String => "string",
        }
    }

    /// Returns the domain named by a keyword
    pub fn from_keyword(word: &str) -> Option<Domain> {
        match word {
            "bigint" => Some(Domain::BigInt),
            "boolean" => Some(Domain::Boolean),
            "number" => Some(Domain::Number),
            "object" => Some(Domain::Object),
            "string" => Some(Domain::String),
            _ => None,
        }
    }

    /// Returns the domain of a JSON value
    pub fn of(value: &Value) -> Domain {
        match value {
            Value::Null => Domain::Null,
            Value::Bool(_) => Domain::Boolean,
            Value::Number(_) => Domain::Number,
            Value::String(_) => Domain::String,
            Value::Array(_) | Value::Object(_) => Domain::Object,
        }
    }

    /// Returns an English description used in diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            Domain::BigInt => "a bigint",
            Domain::Boolean => "boolean",
            Domain::Null => "null",
            Domain::Number => "a number",
            Domain::Object => "an object",
            Domain::String => "a string",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A literal value admitted by a `Unit` node.
#[derive(Debug, Clone)]
pub enum UnitValue {
    Boolean(bool),
    Null,
    Number(Number),
    String(String),
    /// Decimal digits of a bigint literal, sign included
    BigInt(String),
}

impl PartialEq for UnitValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UnitValue::Boolean(a), UnitValue::Boolean(b)) => a == b,
            (UnitValue::Null, UnitValue::Null) => true,
            (UnitValue::Number(a), UnitValue::Number(b)) => a.as_f64() == b.as_f64(),
            (UnitValue::String(a), UnitValue::String(b)) => a == b,
            (UnitValue::BigInt(a), UnitValue::BigInt(b)) => a == b,
            _ => false,
        }
    }
}

impl UnitValue {
    /// Builds a number unit, normalizing integral floats to integers
    pub fn number(value: f64) -> Option<UnitValue> {
        normalize_number(value).map(UnitValue::Number)
    }

    /// Builds a unit from a primitive JSON value; objects and arrays have no unit form
    pub fn from_json(value: &Value) -> Option<UnitValue> {
        match value {
            Value::Null => Some(UnitValue::Null),
            Value::Bool(b) => Some(UnitValue::Boolean(*b)),
            Value::Number(n) => n.as_f64().and_then(UnitValue::number),
            Value::String(s) => Some(UnitValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns the JSON value of this unit, if JSON can represent it
    pub fn to_json(&self) -> Option<Value> {
        match self {
            UnitValue::Boolean(b) => Some(Value::Bool(*b)),
            UnitValue::Null => Some(Value::Null),
            UnitValue::Number(n) => Some(Value::Number(n.clone())),
            UnitValue::String(s) => Some(Value::String(s.clone())),
            UnitValue::BigInt(_) => None,
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            UnitValue::Boolean(_) => Domain::Boolean,
            UnitValue::Null => Domain::Null,
            UnitValue::Number(_) => Domain::Number,
            UnitValue::String(_) => Domain::String,
            UnitValue::BigInt(_) => Domain::BigInt,
        }
    }

    /// Whether `data` is exactly this unit
    pub fn matches(&self, data: &Value) -> bool {
        match (self, data) {
            (UnitValue::Boolean(a), Value::Bool(b)) => a == b,
            (UnitValue::Null, Value::Null) => true,
            (UnitValue::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
            (UnitValue::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Size of the unit as seen by a bound: numeric value or char count
    pub fn size(&self) -> Option<f64> {
        match self {
            UnitValue::Number(n) => n.as_f64(),
            UnitValue::String(s) => Some(s.chars().count() as f64),
            _ => None,
        }
    }

    /// Canonical grammar expression of the unit
    pub fn expression(&self) -> String {
        match self {
            UnitValue::Boolean(b) => b.to_string(),
            UnitValue::Null => "null".to_string(),
            UnitValue::Number(n) => format_number(n.as_f64().unwrap_or(0.0)),
            UnitValue::String(s) => quote(s),
            UnitValue::BigInt(digits) => format!("{}n", digits),
        }
    }
}

/// Renders a string as an enclosed grammar literal.
fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(delimiter);
    for c in text.chars() {
        if c == '\\' || c == delimiter {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(delimiter);
    out
}

/// Normalizes a finite float to a JSON number, preferring the integer form.
pub fn normalize_number(value: f64) -> Option<Number> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Some(Number::from(value as i64));
    }
    Number::from_f64(value)
}

/// Formats a number the way the grammar writes number literals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// One end of a range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub value: f64,
    pub exclusive: bool,
}

impl Limit {
    pub fn inclusive(value: f64) -> Self {
        Self { value, exclusive: false }
    }

    pub fn exclusive(value: f64) -> Self {
        Self { value, exclusive: true }
    }
}

/// A size range. Size is the value of a number, the length of a string
/// or the item count of an array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: Option<Limit>,
    pub max: Option<Limit>,
}

impl Range {
    pub fn at_least(limit: Limit) -> Self {
        Self { min: Some(limit), max: None }
    }

    pub fn at_most(limit: Limit) -> Self {
        Self { min: None, max: Some(limit) }
    }

    pub fn exactly(value: f64) -> Self {
        Self {
            min: Some(Limit::inclusive(value)),
            max: Some(Limit::inclusive(value)),
        }
    }

    /// Whether a size falls within the range
    pub fn allows(&self, size: f64) -> bool {
        if let Some(min) = self.min {
            if size < min.value || (min.exclusive && size == min.value) {
                return false;
            }
        }
        if let Some(max) = self.max {
            if size > max.value || (max.exclusive && size == max.value) {
                return false;
            }
        }
        true
    }

    /// Whether no size can satisfy the range
    pub fn is_empty(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => match min.value.partial_cmp(&max.value) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => min.exclusive || max.exclusive,
                Some(Ordering::Less) => false,
                None => true,
            },
            _ => false,
        }
    }

    /// Returns the exact size when min and max pin a single inclusive value
    pub fn exact(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max))
                if min.value == max.value && !min.exclusive && !max.exclusive =>
            {
                Some(min.value)
            }
            _ => None,
        }
    }

    /// Keeps the tighter min and the tighter max. `None` when empty.
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(tighter(a, b, Ordering::Greater)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(tighter(a, b, Ordering::Less)),
            (a, b) => a.or(b),
        };
        let range = Range { min, max };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    /// Canonical payload used in the node key
    pub fn key(&self) -> String {
        let mut out = String::new();
        if let Some(min) = self.min {
            out.push_str(if min.exclusive { ">" } else { ">=" });
            out.push_str(&format_number(min.value));
        }
        if let Some(max) = self.max {
            if !out.is_empty() {
                out.push(',');
            }
            out.push_str(if max.exclusive { "<" } else { "<=" });
            out.push_str(&format_number(max.value));
        }
        out
    }
}

fn tighter(a: Limit, b: Limit, direction: Ordering) -> Limit {
    match a.value.partial_cmp(&b.value) {
        Some(ordering) if ordering == direction => a,
        Some(Ordering::Equal) => Limit {
            value: a.value,
            exclusive: a.exclusive || b.exclusive,
        },
        _ => b,
    }
}

/// Class-like bases that narrow a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BasisKind {
    /// A JSON array
    Array,
    /// A string holding an RFC 3339 timestamp
    Date,
}

impl BasisKind {
    pub fn name(&self) -> &'static str {
        match self {
            BasisKind::Array => "Array",
            BasisKind::Date => "Date",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            BasisKind::Array => Domain::Object,
            BasisKind::Date => Domain::String,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            BasisKind::Array => "an array",
            BasisKind::Date => "a date",
        }
    }

    pub fn allows(&self, data: &Value) -> bool {
        match (self, data) {
            (BasisKind::Array, Value::Array(_)) => true,
            (BasisKind::Date, Value::String(s)) => is_date(s),
            _ => false,
        }
    }

    pub fn allows_unit(&self, unit: &UnitValue) -> bool {
        match (self, unit) {
            (BasisKind::Date, UnitValue::String(s)) => is_date(s),
            _ => false,
        }
    }
}

fn is_date(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
}

/// A compiled regular expression remembered by its source.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Conjunctive set of patterns, ordered by source.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn single(pattern: Pattern) -> Self {
        Self { patterns: vec![pattern] }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn union(&self, other: &PatternSet) -> PatternSet {
        let mut patterns = self.patterns.clone();
        for pattern in &other.patterns {
            if !patterns.contains(pattern) {
                patterns.push(pattern.clone());
            }
        }
        patterns.sort_by(|a, b| a.source.cmp(&b.source));
        PatternSet { patterns }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().all(|p| p.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_domain_of_json() {
        assert_eq!(Domain::of(&json!("x")), Domain::String);
        assert_eq!(Domain::of(&json!(1.5)), Domain::Number);
        assert_eq!(Domain::of(&json!([1])), Domain::Object);
        assert_eq!(Domain::of(&json!({})), Domain::Object);
        assert_eq!(Domain::of(&json!(null)), Domain::Null);
        assert_eq!(Domain::of(&json!(true)), Domain::Boolean);
    }

    #[test]
    fn test_unit_numbers_compare_by_value() {
        let five = UnitValue::number(5.0).unwrap();
        assert!(five.matches(&json!(5)));
        assert!(five.matches(&json!(5.0)));
        assert_eq!(five.expression(), "5");
        assert_eq!(UnitValue::number(0.5).unwrap().expression(), "0.5");
    }

    #[test]
    fn test_unit_string_quoting() {
        assert_eq!(UnitValue::String("a".into()).expression(), "'a'");
        assert_eq!(UnitValue::String("it's".into()).expression(), "\"it's\"");
        assert_eq!(UnitValue::String("a'\"".into()).expression(), "'a\\'\"'");
    }

    #[test]
    fn test_range_intersection_keeps_tighter_limits() {
        let a = Range {
            min: Some(Limit::inclusive(5.0)),
            max: Some(Limit::exclusive(10.0)),
        };
        let b = Range {
            min: Some(Limit::exclusive(5.0)),
            max: Some(Limit::inclusive(20.0)),
        };
        let merged = a.intersect(&b).unwrap();
        assert_eq!(merged.min, Some(Limit::exclusive(5.0)));
        assert_eq!(merged.max, Some(Limit::exclusive(10.0)));
    }

    #[test]
    fn test_range_empty_when_min_exceeds_max() {
        let a = Range::at_least(Limit::inclusive(10.0));
        let b = Range::at_most(Limit::exclusive(10.0));
        assert!(a.intersect(&b).is_none());
        assert!(Range::exactly(3.0).intersect(&Range::exactly(3.0)).is_some());
    }

    #[test]
    fn test_date_basis() {
        assert!(BasisKind::Date.allows(&json!("2024-01-02T03:04:05Z")));
        assert!(!BasisKind::Date.allows(&json!("yesterday")));
        assert!(BasisKind::Array.allows(&json!([])));
        assert!(!BasisKind::Array.allows(&json!({})));
    }

    #[test]
    fn test_pattern_set_union_dedups() {
        let a = PatternSet::single(Pattern::new("^a").unwrap());
        let b = PatternSet::single(Pattern::new("b$").unwrap());
        let both = a.union(&b).union(&a);
        assert_eq!(both.patterns().len(), 2);
        assert!(both.is_match("ab"));
        assert!(!both.is_match("ba"));
    }
}
