//! Program traversal
//!
//! Runs a compiled `Program` against data. Descent into keys, items, union
//! branches, aliases and morph inputs goes through an explicit frame stack,
//! so deeply nested data costs heap, not call stack. Output is
//! copy-on-write: data is only cloned along paths where a morph produced a
//! new value.

use std::borrow::Cow;
use std::mem;
use std::sync::Arc;

use serde_json::Value;

use super::problems::{data_domain, describe_data, PathSegment, Problem, ProblemCode};
use super::{Check, Dimension, Dispatch, Program};
use crate::discriminate::{observe, DiscriminantKind};
use crate::node::{describe_range, format_number, AliasRef, Domain, MorphStep, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Stop at the first failure, record nothing
    Allows,
    /// Record every problem and run morphs
    Apply,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy)]
enum Step {
    Pass,
    /// Failed; later checks on the same path still run in Apply mode
    Fail,
    /// Failed; the rest of the path is meaningless
    Abort,
}

/// Result a finished frame hands to the frame below it.
enum Done<'a> {
    /// Program output, `None` when a check failed
    Value(Option<Cow<'a, Value>>),
    /// Outcome of a per-child check plus morphed children to write back
    Children(Step, Vec<(PathSegment, Value)>),
}

enum Action<'a> {
    Push(Frame<'a>),
    Continue,
    Finish(Done<'a>),
}

/// A check either settles at once or descends into a child frame.
enum Begin<'a> {
    Settled(Step),
    Descend(Frame<'a>, Pending),
}

/// How a program frame folds the result of the child it waits on.
enum Pending {
    Nothing,
    /// Morphed output replaces the value under this key
    Key(String),
    /// Morphed output replaces the whole value
    Whole,
    Children,
}

enum Frame<'a> {
    Program(ProgramFrame<'a>),
    Children(ChildrenFrame<'a>),
    Branches(BranchesFrame<'a>),
    Alias(AliasFrame<'a>),
    Morph(MorphFrame<'a>),
}

impl<'a> Frame<'a> {
    fn advance(&mut self, t: &mut Traversal) -> Action<'a> {
        match self {
            Frame::Program(frame) => frame.advance(t),
            Frame::Children(frame) => frame.advance(t),
            Frame::Branches(frame) => frame.advance(t),
            Frame::Alias(frame) => frame.advance(),
            Frame::Morph(frame) => frame.advance(),
        }
    }

    fn resume(&mut self, t: &mut Traversal, done: Done<'a>) -> Action<'a> {
        match self {
            Frame::Program(frame) => frame.resume(t, done),
            Frame::Children(frame) => frame.resume(t, output_of(done)),
            Frame::Branches(frame) => frame.resume(t, output_of(done)),
            Frame::Alias(_) => {
                t.depth -= 1;
                Action::Finish(Done::Value(output_of(done)))
            }
            Frame::Morph(frame) => frame.resume(t, output_of(done)),
        }
    }
}

fn output_of(done: Done<'_>) -> Option<Cow<'_, Value>> {
    match done {
        Done::Value(output) => output,
        Done::Children(..) => None,
    }
}

/// Runs the checks of one program over one value.
struct ProgramFrame<'a> {
    program: Program,
    data: &'a Value,
    output: Cow<'a, Value>,
    next: usize,
    failed: bool,
    pending: Pending,
    /// Pops a path segment when done
    nested: bool,
}

impl<'a> ProgramFrame<'a> {
    fn new(program: Program, data: &'a Value, nested: bool) -> Self {
        Self {
            program,
            data,
            output: Cow::Borrowed(data),
            next: 0,
            failed: false,
            pending: Pending::Nothing,
            nested,
        }
    }

    fn advance(&mut self, t: &mut Traversal) -> Action<'a> {
        while let Some(check) = self.program.checks.get(self.next) {
            self.next += 1;
            match t.begin(check, self.data) {
                Begin::Settled(step) => {
                    if let Some(action) = self.fold(t, step) {
                        return action;
                    }
                }
                Begin::Descend(frame, pending) => {
                    self.pending = pending;
                    return Action::Push(frame);
                }
            }
        }
        let output = if self.failed {
            None
        } else {
            Some(mem::replace(&mut self.output, Cow::Borrowed(self.data)))
        };
        self.finish(t, output)
    }

    fn resume(&mut self, t: &mut Traversal, done: Done<'a>) -> Action<'a> {
        let step = match (mem::replace(&mut self.pending, Pending::Nothing), done) {
            (Pending::Key(key), Done::Value(result)) => match result {
                Some(Cow::Owned(value)) => {
                    write_child(self.output.to_mut(), PathSegment::Key(key), value);
                    Step::Pass
                }
                Some(Cow::Borrowed(_)) => Step::Pass,
                None => Step::Fail,
            },
            (Pending::Whole, Done::Value(result)) => match result {
                Some(Cow::Owned(value)) => {
                    self.output = Cow::Owned(value);
                    Step::Pass
                }
                Some(Cow::Borrowed(_)) => Step::Pass,
                None => Step::Fail,
            },
            (Pending::Children, Done::Children(step, patches)) => {
                for (segment, value) in patches {
                    write_child(self.output.to_mut(), segment, value);
                }
                step
            }
            _ => Step::Fail,
        };
        self.fold(t, step).unwrap_or(Action::Continue)
    }

    /// Finishes the frame when `step` ends this program
    fn fold(&mut self, t: &mut Traversal, step: Step) -> Option<Action<'a>> {
        match step {
            Step::Pass => None,
            Step::Fail if t.mode == Mode::Apply => {
                self.failed = true;
                None
            }
            Step::Fail | Step::Abort => Some(self.finish(t, None)),
        }
    }

    fn finish(&mut self, t: &mut Traversal, output: Option<Cow<'a, Value>>) -> Action<'a> {
        if self.nested {
            t.path.pop();
        }
        Action::Finish(Done::Value(output))
    }
}

/// Runs one program per array item or indexed entry.
struct ChildrenFrame<'a> {
    jobs: std::vec::IntoIter<(PathSegment, Program, &'a Value)>,
    current: Option<PathSegment>,
    step: Step,
    patches: Vec<(PathSegment, Value)>,
}

impl<'a> ChildrenFrame<'a> {
    fn new(jobs: Vec<(PathSegment, Program, &'a Value)>) -> Self {
        Self {
            jobs: jobs.into_iter(),
            current: None,
            step: Step::Pass,
            patches: Vec::new(),
        }
    }

    fn advance(&mut self, t: &mut Traversal) -> Action<'a> {
        match self.jobs.next() {
            Some((segment, program, child)) => {
                t.path.push(segment.clone());
                self.current = Some(segment);
                Action::Push(Frame::Program(ProgramFrame::new(program, child, true)))
            }
            None => Action::Finish(Done::Children(self.step, mem::take(&mut self.patches))),
        }
    }

    fn resume(&mut self, t: &mut Traversal, output: Option<Cow<'a, Value>>) -> Action<'a> {
        let segment = self.current.take();
        match output {
            Some(Cow::Owned(value)) => {
                if let Some(segment) = segment {
                    self.patches.push((segment, value));
                }
            }
            Some(Cow::Borrowed(_)) => {}
            None if t.mode == Mode::Allows => {
                return Action::Finish(Done::Children(Step::Fail, Vec::new()));
            }
            None => self.step = Step::Fail,
        }
        Action::Continue
    }
}

/// Tries union branches in order; the first that passes wins.
struct BranchesFrame<'a> {
    programs: Arc<[Program]>,
    next: usize,
    data: &'a Value,
    /// Problems from before the current attempt
    saved: Option<Vec<Problem>>,
    expected: Arc<str>,
}

impl<'a> BranchesFrame<'a> {
    fn advance(&mut self, t: &mut Traversal) -> Action<'a> {
        match self.programs.get(self.next).cloned() {
            Some(program) => {
                self.next += 1;
                self.saved = Some(mem::take(&mut t.problems));
                Action::Push(Frame::Program(ProgramFrame::new(program, self.data, false)))
            }
            None => {
                let data = self.data;
                t.report(ProblemCode::Union, || {
                    format!("must be {} (was {})", self.expected, describe_data(data))
                });
                Action::Finish(Done::Value(None))
            }
        }
    }

    fn resume(&mut self, t: &mut Traversal, output: Option<Cow<'a, Value>>) -> Action<'a> {
        if let Some(saved) = self.saved.take() {
            t.problems = saved;
        }
        match output {
            Some(output) => Action::Finish(Done::Value(Some(output))),
            None => Action::Continue,
        }
    }
}

/// Runs an alias target one hop deeper.
struct AliasFrame<'a> {
    program: Option<Program>,
    data: &'a Value,
}

impl<'a> AliasFrame<'a> {
    fn advance(&mut self) -> Action<'a> {
        match self.program.take() {
            Some(program) => Action::Push(Frame::Program(ProgramFrame::new(program, self.data, false))),
            None => Action::Finish(Done::Value(None)),
        }
    }
}

/// Validates a morph input, then runs the pipeline over it.
struct MorphFrame<'a> {
    input: Option<Program>,
    steps: Arc<[MorphStep]>,
    data: &'a Value,
}

impl<'a> MorphFrame<'a> {
    fn advance(&mut self) -> Action<'a> {
        match self.input.take() {
            Some(input) => Action::Push(Frame::Program(ProgramFrame::new(input, self.data, false))),
            None => Action::Finish(Done::Value(None)),
        }
    }

    fn resume(&mut self, t: &mut Traversal, output: Option<Cow<'a, Value>>) -> Action<'a> {
        let output = match output {
            Some(validated) if t.mode == Mode::Apply => t.morph(&self.steps, validated.into_owned()),
            other => other,
        };
        Action::Finish(Done::Value(output))
    }
}

fn write_child(output: &mut Value, segment: PathSegment, value: Value) {
    match segment {
        PathSegment::Key(key) => {
            if let Some(entries) = output.as_object_mut() {
                entries.insert(key, value);
            }
        }
        PathSegment::Index(index) => {
            if let Some(slot) = output.as_array_mut().and_then(|items| items.get_mut(index)) {
                *slot = value;
            }
        }
    }
}

pub(crate) struct Traversal {
    mode: Mode,
    /// Opt-in cap on nested alias hops
    max_depth: Option<usize>,
    depth: usize,
    path: Vec<PathSegment>,
    pub problems: Vec<Problem>,
}

impl Traversal {
    pub fn new(mode: Mode, max_depth: Option<usize>) -> Self {
        Self {
            mode,
            max_depth,
            depth: 0,
            path: Vec::new(),
            problems: Vec::new(),
        }
    }

    /// Runs `program` over `data`, returning the (possibly morphed) output
    /// or `None` when any check failed.
    pub fn run<'a>(&mut self, program: &Program, data: &'a Value) -> Option<Cow<'a, Value>> {
        let mut stack = vec![Frame::Program(ProgramFrame::new(program.clone(), data, false))];
        let mut done: Option<Done<'a>> = None;
        while let Some(frame) = stack.last_mut() {
            let action = match done.take() {
                Some(result) => frame.resume(self, result),
                None => frame.advance(self),
            };
            match action {
                Action::Push(child) => stack.push(child),
                Action::Continue => {}
                Action::Finish(result) => {
                    stack.pop();
                    done = Some(result);
                }
            }
        }
        done.and_then(output_of)
    }

    fn begin<'a>(&mut self, check: &Check, data: &'a Value) -> Begin<'a> {
        match check {
            Check::Key {
                key,
                required,
                program,
            } => match data.as_object().and_then(|entries| entries.get(key)) {
                Some(child) => {
                    self.path.push(PathSegment::Key(key.clone()));
                    Begin::Descend(
                        Frame::Program(ProgramFrame::new(program.clone(), child, true)),
                        Pending::Key(key.clone()),
                    )
                }
                None if !required => Begin::Settled(Step::Pass),
                None => {
                    self.report_at(ProblemCode::Missing, &[key.clone()], || {
                        "must be defined".to_string()
                    });
                    Begin::Settled(Step::Fail)
                }
            },
            Check::Index { key, value, named } => self.index(key, value, named, data),
            Check::Elements { prefix, variadic } => self.elements(prefix, variadic.as_ref(), data),
            Check::Union {
                dispatch,
                fallback,
                expected,
            } => match self.route(dispatch, fallback, data) {
                None => Begin::Settled(Step::Fail),
                Some(programs) => {
                    let frame = match &programs[..] {
                        [only] => Frame::Program(ProgramFrame::new(only.clone(), data, false)),
                        _ => Frame::Branches(BranchesFrame {
                            programs,
                            next: 0,
                            data,
                            saved: None,
                            expected: expected.clone(),
                        }),
                    };
                    Begin::Descend(frame, Pending::Whole)
                }
            },
            Check::Alias(alias) => match self.enter_alias(alias) {
                Some(program) => Begin::Descend(
                    Frame::Alias(AliasFrame {
                        program: Some(program),
                        data,
                    }),
                    Pending::Whole,
                ),
                None => Begin::Settled(Step::Fail),
            },
            Check::Morph { input, steps } => Begin::Descend(
                Frame::Morph(MorphFrame {
                    input: Some(input.clone()),
                    steps: steps.clone(),
                    data,
                }),
                Pending::Whole,
            ),
            other => Begin::Settled(self.check(other, data)),
        }
    }

    /// Checks that never descend.
    fn check(&mut self, check: &Check, data: &Value) -> Step {
        match check {
            Check::Domain(domain) => {
                if Domain::of(data) == *domain {
                    return Step::Pass;
                }
                self.report(ProblemCode::Domain, || {
                    format!("must be {} (was {})", domain.describe(), data_domain(data))
                });
                Step::Abort
            }
            Check::Unit(unit) => {
                if unit.matches(data) {
                    return Step::Pass;
                }
                self.report(ProblemCode::Unit, || {
                    format!("must be {} (was {})", unit.expression(), describe_data(data))
                });
                Step::Abort
            }
            Check::Basis(basis) => {
                if basis.allows(data) {
                    return Step::Pass;
                }
                self.report(ProblemCode::Basis, || {
                    format!("must be {} (was {})", basis.describe(), describe_data(data))
                });
                Step::Abort
            }
            Check::Range { range, dimension } => self.range(range, *dimension, data),
            Check::Divisor(divisor) => self.divisor(*divisor, data),
            Check::Pattern(set) => {
                let text = data.as_str().unwrap_or_default();
                if data.is_string() && set.is_match(text) {
                    return Step::Pass;
                }
                self.report(ProblemCode::Pattern, || {
                    let sources: Vec<String> =
                        set.patterns().iter().map(|p| format!("/{}/", p.source())).collect();
                    format!("must match {} (was {})", sources.join(" and "), describe_data(data))
                });
                Step::Fail
            }
            Check::Never => {
                self.report(ProblemCode::Union, || {
                    format!("must be nothing (was {})", describe_data(data))
                });
                Step::Abort
            }
            Check::Key { .. }
            | Check::Index { .. }
            | Check::Elements { .. }
            | Check::Union { .. }
            | Check::Alias(_)
            | Check::Morph { .. } => Step::Fail,
        }
    }

    fn report(&mut self, code: ProblemCode, message: impl FnOnce() -> String) {
        self.report_at(code, &[], message);
    }

    fn report_at(&mut self, code: ProblemCode, suffix: &[String], message: impl FnOnce() -> String) {
        if self.mode == Mode::Allows {
            return;
        }
        let mut path = self.path.clone();
        path.extend(suffix.iter().cloned().map(PathSegment::Key));
        self.problems.push(Problem {
            path,
            code,
            message: message(),
        });
    }

    fn range(&mut self, range: &Range, dimension: Dimension, data: &Value) -> Step {
        let size = match (dimension, data) {
            (Dimension::Value | Dimension::Dynamic, Value::Number(n)) => n.as_f64(),
            (Dimension::Chars | Dimension::Dynamic, Value::String(s)) => {
                Some(s.chars().count() as f64)
            }
            (Dimension::Items | Dimension::Dynamic, Value::Array(items)) => Some(items.len() as f64),
            _ => None,
        };
        match size {
            Some(size) if range.allows(size) => Step::Pass,
            Some(size) => {
                let measured = !data.is_number();
                self.report(ProblemCode::Range, || {
                    if measured {
                        format!("must have length {} (was {})", describe_range(range), format_number(size))
                    } else {
                        format!("must be {} (was {})", describe_range(range), format_number(size))
                    }
                });
                Step::Fail
            }
            None => {
                self.report(ProblemCode::Range, || {
                    format!("must be {} (was {})", describe_range(range), describe_data(data))
                });
                Step::Fail
            }
        }
    }

    fn divisor(&mut self, divisor: u64, data: &Value) -> Step {
        if let Some(value) = data.as_f64() {
            if value % divisor as f64 == 0.0 {
                return Step::Pass;
            }
        }
        self.report(ProblemCode::Divisor, || {
            let expected = if divisor == 1 {
                "an integer".to_string()
            } else {
                format!("a multiple of {}", divisor)
            };
            format!("must be {} (was {})", expected, describe_data(data))
        });
        Step::Fail
    }

    fn index<'a>(&mut self, key: &Program, value: &Program, named: &[String], data: &'a Value) -> Begin<'a> {
        let Some(entries) = data.as_object() else {
            return Begin::Settled(Step::Pass);
        };
        let max_depth = self.max_depth;
        let jobs: Vec<_> = entries
            .iter()
            .filter(|(name, _)| !named.iter().any(|n| n == *name))
            .filter(|(name, _)| {
                let name_value = Value::String((*name).clone());
                let matched = Traversal::new(Mode::Allows, max_depth)
                    .run(key, &name_value)
                    .is_some();
                matched
            })
            .map(|(name, child)| (PathSegment::Key(name.clone()), value.clone(), child))
            .collect();
        if jobs.is_empty() {
            return Begin::Settled(Step::Pass);
        }
        Begin::Descend(Frame::Children(ChildrenFrame::new(jobs)), Pending::Children)
    }

    fn elements<'a>(&mut self, prefix: &[Program], variadic: Option<&Program>, data: &'a Value) -> Begin<'a> {
        let Some(items) = data.as_array() else {
            return Begin::Settled(Step::Pass);
        };

        let length_ok = match variadic {
            Some(_) => items.len() >= prefix.len(),
            None => items.len() == prefix.len(),
        };
        if !length_ok {
            self.report(ProblemCode::Range, || {
                let word = if variadic.is_some() { "at least" } else { "exactly" };
                format!("must have length {} {} (was {})", word, prefix.len(), items.len())
            });
            return Begin::Settled(Step::Abort);
        }

        let jobs: Vec<_> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let program = prefix.get(index).or(variadic)?;
                Some((PathSegment::Index(index), program.clone(), item))
            })
            .collect();
        if jobs.is_empty() {
            return Begin::Settled(Step::Pass);
        }
        Begin::Descend(Frame::Children(ChildrenFrame::new(jobs)), Pending::Children)
    }

    /// Follows a union's switches to the branches left to test; `None`
    /// when routing already failed.
    fn route(&mut self, dispatch: &Dispatch, fallback: &Arc<[Program]>, data: &Value) -> Option<Arc<[Program]>> {
        let mut current = dispatch;
        loop {
            match current {
                Dispatch::Sequential(programs) => return Some(programs.clone()),
                Dispatch::Switch {
                    path,
                    kind,
                    cases,
                    expected,
                } => match observe(path, *kind, data) {
                    None if self.mode == Mode::Apply => return Some(fallback.clone()),
                    None => return None,
                    Some(key) => match cases.get(&key) {
                        Some(case) => current = case,
                        None => {
                            let observed = lookup(path, data).unwrap_or(data);
                            let (code, was) = match kind {
                                DiscriminantKind::Domain => {
                                    (ProblemCode::Domain, data_domain(observed).to_string())
                                }
                                DiscriminantKind::Unit => (ProblemCode::Unit, describe_data(observed)),
                            };
                            self.report_at(code, path, || format!("must be {} (was {})", expected, was));
                            return None;
                        }
                    },
                },
            }
        }
    }

    /// Target program of `alias`, one hop deeper; `None` after reporting
    /// why it cannot be entered.
    fn enter_alias(&mut self, alias: &AliasRef) -> Option<Program> {
        if let Some(max) = self.max_depth.filter(|max| self.depth >= *max) {
            self.report(ProblemCode::Depth, || {
                format!("exceeded the maximum validation depth of {} at {}", max, alias.name())
            });
            return None;
        }
        let target = match alias.target() {
            Ok(target) => target,
            Err(err) => {
                self.report(ProblemCode::Alias, || err.message().to_string());
                return None;
            }
        };
        self.depth += 1;
        Some(target.validator().program().clone())
    }

    fn morph<'a>(&mut self, steps: &[MorphStep], mut value: Value) -> Option<Cow<'a, Value>> {
        for step in steps {
            let before = describe_data(&value);
            match step.run(value) {
                Ok(next) => value = next,
                Err(message) => {
                    self.report(ProblemCode::Morph, || format!("{} (was {})", message, before));
                    return None;
                }
            }
        }
        Some(Cow::Owned(value))
    }
}

fn lookup<'a>(path: &[String], data: &'a Value) -> Option<&'a Value> {
    path.iter()
        .try_fold(data, |current, key| current.as_object()?.get(key))
}
