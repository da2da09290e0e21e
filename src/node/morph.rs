//! Morph steps: transforms applied to data after its input node validates

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::primitives::normalize_number;

/// Signature of a user-registered transform.
pub type MorphFn = dyn Fn(Value) -> Result<Value, String> + Send + Sync;

/// Built-in transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMorph {
    ParseNumber,
    ParseInteger,
    ParseDate,
    ParseJson,
    Trim,
    ToLowercase,
    ToUppercase,
}

impl BuiltinMorph {
    pub const ALL: [BuiltinMorph; 7] = [
        BuiltinMorph::ParseNumber,
        BuiltinMorph::ParseInteger,
        BuiltinMorph::ParseDate,
        BuiltinMorph::ParseJson,
        BuiltinMorph::Trim,
        BuiltinMorph::ToLowercase,
        BuiltinMorph::ToUppercase,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinMorph::ParseNumber => "parse.number",
            BuiltinMorph::ParseInteger => "parse.integer",
            BuiltinMorph::ParseDate => "parse.date",
            BuiltinMorph::ParseJson => "parse.json",
            BuiltinMorph::Trim => "trim",
            BuiltinMorph::ToLowercase => "to.lowercase",
            BuiltinMorph::ToUppercase => "to.uppercase",
        }
    }

    pub fn from_name(name: &str) -> Option<BuiltinMorph> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    fn run(&self, data: Value) -> Result<Value, String> {
        let Value::String(text) = data else {
            return Err("must be a string".to_string());
        };
        match self {
            BuiltinMorph::ParseNumber => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(normalize_number)
                .map(Value::Number)
                .ok_or_else(|| "must be a well-formed numeric string".to_string()),
            BuiltinMorph::ParseInteger => text
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| "must be a well-formed integer string".to_string()),
            BuiltinMorph::ParseDate => DateTime::parse_from_rfc3339(text.trim())
                .map(|d| {
                    Value::String(
                        d.with_timezone(&Utc)
                            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    )
                })
                .map_err(|_| "must be a valid date".to_string()),
            BuiltinMorph::ParseJson => serde_json::from_str(&text)
                .map_err(|e| format!("must be a valid JSON string ({})", e)),
            BuiltinMorph::Trim => Ok(Value::String(text.trim().to_string())),
            BuiltinMorph::ToLowercase => Ok(Value::String(text.to_lowercase())),
            BuiltinMorph::ToUppercase => Ok(Value::String(text.to_uppercase())),
        }
    }
}

/// One step of a morph pipeline.
#[derive(Clone)]
pub enum MorphStep {
    Builtin(BuiltinMorph),
    Custom { name: String, func: Arc<MorphFn> },
}

impl MorphStep {
    pub fn custom(name: impl Into<String>, func: Arc<MorphFn>) -> Self {
        MorphStep::Custom {
            name: name.into(),
            func,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MorphStep::Builtin(builtin) => builtin.name(),
            MorphStep::Custom { name, .. } => name,
        }
    }

    pub fn run(&self, data: Value) -> Result<Value, String> {
        match self {
            MorphStep::Builtin(builtin) => builtin.run(data),
            MorphStep::Custom { func, .. } => func(data),
        }
    }
}

impl PartialEq for MorphStep {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Debug for MorphStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MorphStep({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_number() {
        let step = MorphStep::Builtin(BuiltinMorph::ParseNumber);
        assert_eq!(step.run(json!("42")).unwrap(), json!(42));
        assert_eq!(step.run(json!("1.5")).unwrap(), json!(1.5));
        assert!(step.run(json!("4x")).is_err());
    }

    #[test]
    fn test_parse_date_normalizes_to_utc() {
        let step = MorphStep::Builtin(BuiltinMorph::ParseDate);
        let out = step.run(json!("2024-01-02T05:04:05+02:00")).unwrap();
        assert_eq!(out, json!("2024-01-02T03:04:05Z"));
    }

    #[test]
    fn test_custom_step() {
        let step = MorphStep::custom("double", Arc::new(|v: Value| {
            v.as_f64()
                .map(|n| json!(n * 2.0))
                .ok_or_else(|| "must be a number".to_string())
        }));
        assert_eq!(step.name(), "double");
        assert_eq!(step.run(json!(2)).unwrap(), json!(4.0));
    }

    #[test]
    fn test_builtin_names_round_trip() {
        for builtin in BuiltinMorph::ALL {
            assert_eq!(BuiltinMorph::from_name(builtin.name()), Some(builtin));
        }
    }
}
