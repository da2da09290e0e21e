//! Operand/operator state machine over the scanner
//!
//! Precedence, tightest first: enclosed literal, postfix (`[]`, `?`, `#`),
//! bound and divisor, `&`, `|`. Each group opens a frame holding the
//! pending left bound, the pending intersection and the union branches
//! collected so far.

use std::sync::OnceLock;

use regex::Regex;

use super::errors::{ParseError, ParseResult};
use super::keywords::{keyword, pattern_node};
use super::scanner::{Comparator, Scanner, Token};
use super::Resolve;
use crate::node::{
    determinate_union, intersect, BasisKind, Domain, Limit, NodeKind, NodeRef, Range, UnitValue,
};

static NUMBER_LITERAL: OnceLock<Option<Regex>> = OnceLock::new();
static BIGINT_LITERAL: OnceLock<Option<Regex>> = OnceLock::new();

fn is_match(cell: &'static OnceLock<Option<Regex>>, source: &str, word: &str) -> bool {
    cell.get_or_init(|| Regex::new(source).ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(word))
}

/// Parses `word` as a number literal
pub(crate) fn number_literal(word: &str) -> Option<f64> {
    if !is_match(&NUMBER_LITERAL, r"^-?(0|[1-9]\d*)(\.\d+)?$", word) {
        return None;
    }
    word.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn bigint_literal(word: &str) -> Option<String> {
    if !is_match(&BIGINT_LITERAL, r"^-?(0|[1-9]\d*)n$", word) {
        return None;
    }
    Some(word.trim_end_matches('n').to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingOperand,
    AwaitingOperator,
    Done,
}

#[derive(Default)]
struct Frame {
    left_bound: Option<(f64, Comparator)>,
    intersection: Option<NodeRef>,
    union: Vec<NodeRef>,
}

/// Parser output: the node and whether a trailing `?` marked it optional.
pub(crate) struct Parsed {
    pub node: NodeRef,
    pub optional: bool,
}

pub(crate) struct Parser<'s, 'r, R: Resolve + ?Sized> {
    scanner: Scanner<'s>,
    ctx: &'r mut R,
    root: Option<NodeRef>,
    frame: Frame,
    groups: Vec<Frame>,
    allow_optional: bool,
    optional: bool,
}

impl<'s, 'r, R: Resolve + ?Sized> Parser<'s, 'r, R> {
    pub fn new(definition: &'s str, ctx: &'r mut R, allow_optional: bool) -> Self {
        Self {
            scanner: Scanner::new(definition),
            ctx,
            root: None,
            frame: Frame::default(),
            groups: Vec::new(),
            allow_optional,
            optional: false,
        }
    }

    pub fn parse(mut self) -> ParseResult<Parsed> {
        let mut state = State::AwaitingOperand;
        while state != State::Done {
            state = match state {
                State::AwaitingOperand => self.operand()?,
                State::AwaitingOperator => self.operator()?,
                State::Done => State::Done,
            };
        }
        let node = self.take_root()?;
        Ok(Parsed {
            node,
            optional: self.optional,
        })
    }

    fn operand(&mut self) -> ParseResult<State> {
        let token = self.scanner.next()?;
        let node = match token {
            Token::GroupOpen => {
                self.groups.push(std::mem::take(&mut self.frame));
                return Ok(State::AwaitingOperand);
            }
            Token::Word(word) => self.word(&word)?,
            Token::Enclosed { delimiter: '/', text } => {
                pattern_node(self.ctx.interner(), &text).ok_or_else(|| {
                    ParseError::syntax(format!("/{}/ is not a valid regular expression", text))
                })?
            }
            Token::Enclosed { text, .. } => self.ctx.interner().unit(UnitValue::String(text)),
            Token::End => {
                return Err(ParseError::missing_operand("Expected an operand before end of definition"))
            }
            other => {
                return Err(ParseError::missing_operand(format!(
                    "Expected an operand (was '{}')",
                    other
                )))
            }
        };
        self.root = Some(node);
        Ok(State::AwaitingOperator)
    }

    fn word(&mut self, word: &str) -> ParseResult<NodeRef> {
        if let Some(value) = number_literal(word) {
            let unit = UnitValue::number(value)
                .ok_or_else(|| ParseError::syntax(format!("'{}' is not a finite number", word)))?;
            return Ok(self.ctx.interner().unit(unit));
        }
        if let Some(digits) = bigint_literal(word) {
            return Ok(self.ctx.interner().unit(UnitValue::BigInt(digits)));
        }
        if let Some(node) = self.ctx.resolve(word)? {
            return Ok(node);
        }
        keyword(self.ctx.interner(), word).ok_or_else(|| ParseError::unresolvable(word))
    }

    fn take_root(&mut self) -> ParseResult<NodeRef> {
        self.root
            .take()
            .ok_or_else(|| ParseError::missing_operand("Expected an operand"))
    }

    fn operator(&mut self) -> ParseResult<State> {
        let token = self.scanner.next()?;
        match token {
            Token::ListPostfix => {
                let root = self.take_root()?;
                self.root = Some(self.ctx.interner().array_of(root));
            }
            Token::Optional => {
                if !self.allow_optional {
                    return Err(ParseError::syntax("'?' is only valid for a property value"));
                }
                if self.scanner.peek()? != &Token::End || !self.groups.is_empty() {
                    return Err(ParseError::syntax("'?' must be the last token of a property value"));
                }
                self.optional = true;
            }
            Token::Brand(name) => {
                let root = self.take_root()?;
                let brand = self.ctx.interner().brand(&name);
                self.root = Some(self.intersect(&root, &brand)?);
            }
            Token::Percent => self.divisor()?,
            Token::Comparator(comparator) => {
                if self.starts_left_bound(comparator)? {
                    return Ok(State::AwaitingOperand);
                }
                self.right_bound(comparator)?;
            }
            Token::Amp => {
                self.push_intersection()?;
                return Ok(State::AwaitingOperand);
            }
            Token::Bar => {
                self.push_intersection()?;
                if let Some(branch) = self.frame.intersection.take() {
                    self.frame.union.push(branch);
                }
                return Ok(State::AwaitingOperand);
            }
            Token::GroupClose => {
                let Some(parent) = self.groups.pop() else {
                    return Err(ParseError::unclosed_group("Unmatched ')'"));
                };
                let node = self.finish_frame()?;
                self.frame = parent;
                self.root = Some(node);
            }
            Token::End => {
                if !self.groups.is_empty() {
                    return Err(ParseError::unclosed_group("Missing ')'"));
                }
                self.root = Some(self.finish_frame()?);
                return Ok(State::Done);
            }
            other => {
                return Err(ParseError::syntax(format!(
                    "Unexpected '{}' after an operand",
                    other
                )))
            }
        }
        Ok(State::AwaitingOperator)
    }

    fn intersect(&mut self, left: &NodeRef, right: &NodeRef) -> ParseResult<NodeRef> {
        intersect(self.ctx.interner(), left, right).map_err(ParseError::unsatisfiable)
    }

    fn check_left_bound(&self) -> ParseResult<()> {
        match self.frame.left_bound {
            Some((value, comparator)) => Err(ParseError::invalid_bound(format!(
                "Left bound {}{} must be followed by a bounded expression and a right bound",
                crate::node::format_number(value),
                comparator
            ))),
            None => Ok(()),
        }
    }

    fn push_intersection(&mut self) -> ParseResult<()> {
        self.check_left_bound()?;
        let root = self.take_root()?;
        let combined = match self.frame.intersection.take() {
            Some(pending) => self.intersect(&pending, &root)?,
            None => root,
        };
        self.frame.intersection = Some(combined);
        Ok(())
    }

    fn finish_frame(&mut self) -> ParseResult<NodeRef> {
        self.push_intersection()?;
        let frame = std::mem::take(&mut self.frame);
        let mut branches = frame.union;
        branches.extend(frame.intersection);
        determinate_union(self.ctx.interner(), branches)
    }

    fn divisor(&mut self) -> ParseResult<()> {
        let token = self.scanner.next()?;
        let divisor = match &token {
            Token::Word(word) => word.parse::<u64>().ok().filter(|d| *d > 0),
            _ => None,
        }
        .ok_or_else(|| {
            ParseError::invalid_divisor(format!(
                "% operator must be followed by a positive integer (was '{}')",
                token
            ))
        })?;

        let root = self.take_root()?;
        for branch in root.branches() {
            if branch.domain() != Some(Domain::Number) {
                return Err(ParseError::invalid_divisor(format!(
                    "Divisibility operand {} must be a number",
                    branch.expression()
                )));
            }
        }
        let divisor = self.ctx.interner().divisor(divisor);
        self.root = Some(self.intersect(&root, &divisor)?);
        Ok(())
    }

    /// A number literal followed by `<` or `<=` opens a left bound.
    fn starts_left_bound(&mut self, comparator: Comparator) -> ParseResult<bool> {
        let literal = match self.root.as_ref().map(|r| r.kind()) {
            Some(NodeKind::Unit(UnitValue::Number(n))) => n.as_f64(),
            _ => None,
        };
        let Some(value) = literal else {
            return Ok(false);
        };
        if self.frame.left_bound.is_some() {
            return Err(ParseError::invalid_bound("Only one left bound is allowed"));
        }
        match comparator {
            Comparator::Lt | Comparator::Le => {
                self.frame.left_bound = Some((value, comparator));
                self.root = None;
                Ok(true)
            }
            _ => Err(ParseError::invalid_bound(format!(
                "Left bounds must use < or <= (was {}{})",
                crate::node::format_number(value),
                comparator
            ))),
        }
    }

    fn right_bound(&mut self, comparator: Comparator) -> ParseResult<()> {
        let token = self.scanner.next()?;
        let value = match &token {
            Token::Word(word) => number_literal(word),
            _ => None,
        }
        .ok_or_else(|| {
            ParseError::invalid_bound(format!(
                "Comparator {} must be followed by a number literal (was '{}')",
                comparator, token
            ))
        })?;

        let mut range = range_for(comparator, value);
        if let Some((left, left_comparator)) = self.frame.left_bound.take() {
            if !matches!(comparator, Comparator::Lt | Comparator::Le) {
                return Err(ParseError::invalid_bound(format!(
                    "A left bound must be paired with a right bound using < or <= (was {})",
                    comparator
                )));
            }
            let lower = range_for(left_comparator.invert(), left);
            range = lower.intersect(&range).ok_or_else(|| {
                ParseError::invalid_bound(format!(
                    "{}{}...{}{} is empty",
                    crate::node::format_number(left),
                    left_comparator,
                    comparator,
                    crate::node::format_number(value)
                ))
            })?;
        }

        let root = self.take_root()?;
        for branch in root.branches() {
            let sizable = branch.basis() == Some(BasisKind::Array)
                || matches!(branch.domain(), Some(Domain::Number | Domain::String));
            if !sizable {
                return Err(ParseError::invalid_bound(format!(
                    "Bounded expression {} must be a number, string or array",
                    branch.expression()
                )));
            }
        }
        let bound = self.ctx.interner().bound(range);
        self.root = Some(self.intersect(&root, &bound)?);
        Ok(())
    }
}

fn range_for(comparator: Comparator, value: f64) -> Range {
    match comparator {
        Comparator::Lt => Range::at_most(Limit::exclusive(value)),
        Comparator::Le => Range::at_most(Limit::inclusive(value)),
        Comparator::Gt => Range::at_least(Limit::exclusive(value)),
        Comparator::Ge => Range::at_least(Limit::inclusive(value)),
        Comparator::Eq => Range::exactly(value),
    }
}
