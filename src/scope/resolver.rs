//! Alias resolution
//!
//! # Lifecycle of an alias
//!
//! 1. Unresolved: only the raw definition is known
//! 2. In progress: its definition is being parsed; references to it made
//!    meanwhile become deferred `Alias` nodes
//! 3. Resolved: the parsed node is memoized for the scope's lifetime
//!
//! Resolution is serialized by one mutex per scope. Every alias that reaches
//! step 2 during a top-level call is journaled, and the whole journal is
//! rolled back when that call fails, so a failed resolution leaves no
//! partially resolved aliases behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use crate::config::EngineConfig;
use crate::node::{AliasRef, AliasResolver, Interner, MorphStep, NodeKind, NodeRef};
use crate::observability::{log_event_with_fields, Event};
use crate::parser::{parse_literal, ParseError, ParseResult, Resolve};

#[derive(Debug, Clone)]
enum Resolution {
    InProgress,
    Resolved(NodeRef),
}

/// Mutable scope state guarded by the resolution lock.
#[derive(Default)]
pub(crate) struct ScopeState {
    pub interner: Interner,
    resolutions: HashMap<String, Resolution>,
    /// Aliases touched by the current top-level call, in order
    journal: Vec<String>,
}

pub(crate) struct ScopeInner {
    pub aliases: BTreeMap<String, Value>,
    pub morphs: HashMap<String, MorphStep>,
    pub config: EngineConfig,
    state: Mutex<ScopeState>,
    this: Weak<ScopeInner>,
}

impl ScopeInner {
    pub fn new(
        aliases: BTreeMap<String, Value>,
        morphs: HashMap<String, MorphStep>,
        config: EngineConfig,
        this: Weak<ScopeInner>,
    ) -> Self {
        Self {
            aliases,
            morphs,
            config,
            state: Mutex::new(ScopeState::default()),
            this,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` as one top-level call: on error every alias it resolved is
    /// forgotten again.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut ScopeContext<'_>) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let mut state = self.lock();
        let start = state.journal.len();
        let result = f(&mut ScopeContext {
            inner: self,
            state: &mut *state,
        });
        let touched: Vec<String> = state.journal.drain(start..).collect();
        if result.is_err() {
            for name in touched {
                state.resolutions.remove(&name);
            }
        }
        result
    }

    /// Resolves `name` as a top-level call
    pub fn resolve(&self, name: &str) -> ParseResult<NodeRef> {
        self.transaction(|ctx| ctx.resolve_alias(name))
    }

    /// Names of aliases resolved so far
    pub fn resolved_names(&self) -> Vec<String> {
        let state = self.lock();
        let mut names: Vec<String> = state
            .resolutions
            .iter()
            .filter(|(_, r)| matches!(r, Resolution::Resolved(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Runs `f` with the scope's interner
    pub fn with_interner<T>(&self, f: impl FnOnce(&mut Interner) -> T) -> T {
        f(&mut self.lock().interner)
    }
}

impl AliasResolver for ScopeInner {
    fn resolve_alias(&self, name: &str) -> ParseResult<NodeRef> {
        self.resolve(name)
    }
}

/// Parser context over a locked scope.
pub(crate) struct ScopeContext<'a> {
    inner: &'a ScopeInner,
    state: &'a mut ScopeState,
}

impl ScopeContext<'_> {
    fn resolve_alias(&mut self, name: &str) -> ParseResult<NodeRef> {
        match self.state.resolutions.get(name) {
            Some(Resolution::Resolved(node)) => return Ok(node.clone()),
            Some(Resolution::InProgress) => {
                log_event_with_fields(Event::AliasDeferred, &[("alias", name)]);
                let resolver: Weak<dyn AliasResolver> = self.inner.this.clone();
                let alias = AliasRef::new(name, resolver);
                return Ok(self.state.interner.intern(NodeKind::Alias(alias)));
            }
            None => {}
        }

        let inner = self.inner;
        let Some(definition) = inner.aliases.get(name) else {
            return Err(ParseError::unresolvable(name));
        };

        log_event_with_fields(Event::AliasResolveBegin, &[("alias", name)]);
        self.state
            .resolutions
            .insert(name.to_string(), Resolution::InProgress);
        self.state.journal.push(name.to_string());

        let result = parse_literal(definition, self).and_then(|node| {
            if node.shallow_references().iter().any(|n| n == name) {
                Err(ParseError::cyclic_alias(name))
            } else {
                Ok(node)
            }
        });

        match result {
            Ok(node) => {
                log_event_with_fields(
                    Event::AliasResolved,
                    &[("alias", name), ("node", node.id().short().as_str())],
                );
                self.state
                    .resolutions
                    .insert(name.to_string(), Resolution::Resolved(node.clone()));
                Ok(node)
            }
            Err(err) => {
                let err = err.in_alias(name);
                log_event_with_fields(
                    Event::AliasResolveFailed,
                    &[("alias", name), ("error", err.code().code())],
                );
                Err(err)
            }
        }
    }
}

impl Resolve for ScopeContext<'_> {
    fn interner(&mut self) -> &mut Interner {
        &mut self.state.interner
    }

    fn resolve(&mut self, name: &str) -> ParseResult<Option<NodeRef>> {
        if !self.inner.aliases.contains_key(name) {
            return Ok(None);
        }
        self.resolve_alias(name).map(Some)
    }

    fn morph(&self, name: &str) -> Option<MorphStep> {
        self.inner.morphs.get(name).cloned()
    }
}
