//! Scopes and alias resolution
//!
//! A scope owns a table of alias definitions, the custom morphs they may
//! use, and the interner every node parsed in it is created through.
//!
//! # Resolution
//!
//! Aliases resolve lazily on first reference and are memoized. An alias
//! referenced while its own definition is being parsed becomes a deferred
//! `Alias` node that looks its target up at validation time, so self- and
//! mutually-referential aliases parse in one pass and validate data of any
//! depth. `EngineConfig::max_depth` optionally caps the alias hops.
//!
//! # Usage
//!
//! ```ignore
//! let scope = Scope::builder()
//!     .alias("user", json!({ "name": "string", "friend?": "user" }))?
//!     .build()?;
//! let user = scope.resolve("user")?;
//! assert!(user.allows(&json!({ "name": "a", "friend": { "name": "b" } })));
//! ```

mod errors;
mod resolver;

pub use errors::{ScopeError, ScopeResult};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::compiler::Problems;
use crate::config::EngineConfig;
use crate::errors::Error;
use crate::node::{determinate_union, intersect, BuiltinMorph, Disjoint, MorphFn, MorphStep, NodeRef};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::parser::{parse_literal, parse_string, ParseError, ParseResult};

use resolver::ScopeInner;

/// Whether `name` can be used as an alias identifier
pub fn is_valid_alias_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

/// Builder for a `Scope`.
#[derive(Default)]
pub struct ScopeBuilder {
    aliases: BTreeMap<String, Value>,
    morphs: HashMap<String, MorphStep>,
    config: EngineConfig,
}

impl ScopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an alias definition (grammar string or nested literal)
    pub fn alias(mut self, name: &str, definition: impl Into<Value>) -> ScopeResult<Self> {
        if !is_valid_alias_name(name) {
            return Err(ScopeError::InvalidAliasName(name.to_string()));
        }
        if self.aliases.contains_key(name) {
            return Err(ScopeError::DuplicateAlias(name.to_string()));
        }
        self.aliases.insert(name.to_string(), definition.into());
        Ok(self)
    }

    /// Registers every entry of a JSON object as an alias
    pub fn aliases(mut self, definitions: &Value) -> ScopeResult<Self> {
        let Value::Object(entries) = definitions else {
            return Err(ScopeError::NotAnObject(definitions.to_string()));
        };
        for (name, definition) in entries {
            self = self.alias(name, definition.clone())?;
        }
        Ok(self)
    }

    /// Registers a custom morph usable as `[T, "=>", name]`
    pub fn morph<F>(mut self, name: &str, func: F) -> ScopeResult<Self>
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        if self.morphs.contains_key(name) || BuiltinMorph::from_name(name).is_some() {
            return Err(ScopeError::DuplicateMorph(name.to_string()));
        }
        let func: Arc<MorphFn> = Arc::new(func);
        self.morphs
            .insert(name.to_string(), MorphStep::custom(name, func));
        Ok(self)
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the scope, resolving every alias when eager resolution is on.
    ///
    /// The logger threshold is process-wide: a scope can make it more
    /// verbose but never quieter than another scope left it.
    pub fn build(self) -> Result<Scope, Error> {
        let alias_count = self.aliases.len();
        let eager = self.config.eager_resolution;
        Logger::raise_verbosity(self.config.log_level);

        let inner = Arc::new_cyclic(|this| {
            ScopeInner::new(self.aliases, self.morphs, self.config, this.clone())
        });
        let scope = Scope { inner };

        log_event_with_fields(
            Event::ScopeBuilt,
            &[
                ("aliases", alias_count.to_string().as_str()),
                ("eager", if eager { "true" } else { "false" }),
            ],
        );
        if eager {
            scope.resolve_all()?;
        }
        Ok(scope)
    }
}

/// A table of aliases and the nodes resolved from it.
///
/// Cloning is cheap; clones share resolutions.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::new()
    }

    /// A scope with no aliases
    pub fn empty() -> Self {
        let inner = Arc::new_cyclic(|this| {
            ScopeInner::new(
                BTreeMap::new(),
                HashMap::new(),
                EngineConfig::default(),
                this.clone(),
            )
        });
        Scope { inner }
    }

    /// Builds a scope from a JSON object of alias definitions
    pub fn from_value(definitions: &Value) -> Result<Self, Error> {
        Ok(ScopeBuilder::new().aliases(definitions)?.build()?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Declared alias names, sorted
    pub fn alias_names(&self) -> Vec<&str> {
        self.inner.aliases.keys().map(String::as_str).collect()
    }

    /// Alias names resolved so far, sorted
    pub fn resolved_names(&self) -> Vec<String> {
        self.inner.resolved_names()
    }

    /// Resolves an alias to its node
    pub fn resolve(&self, name: &str) -> ParseResult<Type> {
        if !self.inner.aliases.contains_key(name) {
            return Err(ParseError::unresolvable(name));
        }
        self.inner.resolve(name).map(|node| self.bind(node))
    }

    /// Resolves every alias, stopping at the first failure
    pub fn resolve_all(&self) -> ParseResult<()> {
        for name in self.inner.aliases.keys() {
            self.inner.resolve(name)?;
        }
        Ok(())
    }

    /// Parses a grammar string in this scope
    pub fn parse(&self, definition: &str) -> ParseResult<Type> {
        let result = self
            .inner
            .transaction(|ctx| parse_string(definition, ctx, false).map(|p| p.node));
        self.finish(result, definition)
    }

    /// Parses a nested literal definition in this scope
    pub fn parse_value(&self, definition: &Value) -> ParseResult<Type> {
        let result = self.inner.transaction(|ctx| parse_literal(definition, ctx));
        self.finish(result, &definition.to_string())
    }

    fn finish(&self, result: ParseResult<NodeRef>, definition: &str) -> ParseResult<Type> {
        match result {
            Ok(node) => Ok(self.bind(node)),
            Err(err) => {
                log_event_with_fields(
                    Event::ParseFailed,
                    &[("definition", definition), ("error", err.code().code())],
                );
                Err(err)
            }
        }
    }

    fn bind(&self, node: NodeRef) -> Type {
        Type {
            node,
            scope: self.clone(),
        }
    }

    fn same(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("aliases", &self.alias_names())
            .field("config", self.config())
            .finish()
    }
}

/// A parsed node bound to the scope that produced it.
#[derive(Clone)]
pub struct Type {
    node: NodeRef,
    scope: Scope,
}

impl Type {
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Short-circuit check of `data`
    pub fn allows(&self, data: &Value) -> bool {
        self.node
            .validator()
            .allows_with_depth(data, self.scope.config().max_depth)
    }

    /// Validates `data`, collecting every problem; returns the morphed output
    pub fn apply(&self, data: &Value) -> Result<Value, Problems> {
        self.node
            .validator()
            .apply_with_depth(data, self.scope.config().max_depth)
    }

    /// Like `apply`, but fails once with the combined summary
    pub fn assert(&self, data: &Value) -> Result<Value, Error> {
        Ok(self.apply(data)?)
    }

    /// Intersects with `other`, failing with the disjoint proof when no
    /// value can satisfy both.
    pub fn intersect(&self, other: &Type) -> Result<Type, Disjoint> {
        let node = self
            .scope
            .inner
            .with_interner(|interner| intersect(interner, &self.node, &other.node))?;
        Ok(self.scope.bind(node))
    }

    /// Union with `other`; fails when a morph branch would overlap the
    /// other side
    pub fn or(&self, other: &Type) -> ParseResult<Type> {
        let branches = vec![self.node.clone(), other.node.clone()];
        let node = self
            .scope
            .inner
            .with_interner(|interner| determinate_union(interner, branches))?;
        Ok(self.scope.bind(node))
    }

    /// Array of this type
    pub fn array(&self) -> Type {
        let node = self
            .scope
            .inner
            .with_interner(|interner| interner.array_of(self.node.clone()));
        self.scope.bind(node)
    }

    pub fn describe(&self) -> String {
        self.node.describe()
    }

    pub fn definition(&self) -> Value {
        self.node.definition()
    }

    pub fn expression(&self) -> String {
        self.node.expression()
    }

    /// Whether both types are the same node from the same scope
    pub fn is_identical(&self, other: &Type) -> bool {
        self.scope.same(&other.scope) && Arc::ptr_eq(&self.node, &other.node)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.node.id() == other.node.id()
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.node.expression())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node.expression())
    }
}
