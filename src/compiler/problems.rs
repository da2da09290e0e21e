//! Validation diagnostics

use std::fmt;

use serde_json::Value;

/// One step of a data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// What kind of check a problem came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemCode {
    Domain,
    Unit,
    Range,
    Divisor,
    Pattern,
    Basis,
    Missing,
    Union,
    Morph,
    Depth,
    Alias,
}

impl ProblemCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemCode::Domain => "domain",
            ProblemCode::Unit => "unit",
            ProblemCode::Range => "range",
            ProblemCode::Divisor => "divisor",
            ProblemCode::Pattern => "pattern",
            ProblemCode::Basis => "basis",
            ProblemCode::Missing => "missing",
            ProblemCode::Union => "union",
            ProblemCode::Morph => "morph",
            ProblemCode::Depth => "depth",
            ProblemCode::Alias => "alias",
        }
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single data mismatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub path: Vec<PathSegment>,
    pub code: ProblemCode,
    pub message: String,
}

impl Problem {
    /// Dotted path, empty at the root
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} {}", self.path_string(), self.message)
        }
    }
}

/// Every problem found by one `apply` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problems {
    problems: Vec<Problem>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Problem> {
        self.problems.iter()
    }

    /// Problems found at exactly `path` (dotted)
    pub fn at(&self, path: &str) -> Vec<&Problem> {
        self.problems
            .iter()
            .filter(|p| p.path_string() == path)
            .collect()
    }

    /// One problem renders as `path message`; several render one per line
    pub fn summary(&self) -> String {
        self.problems
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Problem>> for Problems {
    fn from(problems: Vec<Problem>) -> Self {
        Self { problems }
    }
}

impl IntoIterator for Problems {
    type Item = Problem;
    type IntoIter = std::vec::IntoIter<Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.into_iter()
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for Problems {}

/// Short rendering of data for "(was ...)" suffixes.
pub(crate) fn describe_data(data: &Value) -> String {
    match data {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let text: String = s.chars().take(40).collect();
            if text.len() < s.len() {
                format!("'{}...'", text)
            } else {
                format!("'{}'", text)
            }
        }
        Value::Array(items) => format!("an array of length {}", items.len()),
        Value::Object(_) => "an object".to_string(),
    }
}

/// Domain name of data for domain mismatch messages
pub(crate) fn data_domain(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(path: Vec<PathSegment>, message: &str) -> Problem {
        Problem {
            path,
            code: ProblemCode::Domain,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_single_problem_summary() {
        let problems = Problems::from(vec![problem(
            vec![PathSegment::Key("name".into())],
            "must be a string (was number)",
        )]);
        assert_eq!(problems.summary(), "name must be a string (was number)");
    }

    #[test]
    fn test_root_problem_has_no_path_prefix() {
        let problems = Problems::from(vec![problem(vec![], "must be a number (was boolean)")]);
        assert_eq!(problems.to_string(), "must be a number (was boolean)");
    }

    #[test]
    fn test_multiple_problems_one_per_line() {
        let problems = Problems::from(vec![
            problem(vec![PathSegment::Key("a".into())], "x"),
            problem(vec![PathSegment::Key("b".into()), PathSegment::Index(0)], "y"),
        ]);
        assert_eq!(problems.summary(), "a x\nb.0 y");
        assert_eq!(problems.at("b.0").len(), 1);
    }

    #[test]
    fn test_long_strings_are_truncated() {
        let long = "x".repeat(100);
        assert!(describe_data(&Value::String(long)).ends_with("...'"));
    }
}
