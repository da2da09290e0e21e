//! Engine configuration
//!
//! Set once per scope through `ScopeBuilder::config`. Every field has a
//! default so partial JSON configs deserialize.

use serde::{Deserialize, Serialize};

use crate::observability::Severity;

/// Scope-wide engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cap on nested alias hops during one validation (default: none).
    /// Traversal runs on a heap stack, so leaving it unset is safe for
    /// arbitrarily deep data.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Resolve every alias when the scope is built (default: false)
    #[serde(default)]
    pub eager_resolution: bool,

    /// Minimum severity written by the logger (default: warn)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_log_level() -> Severity {
    Severity::Warn
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            eager_resolution: false,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Config that resolves all aliases at build time
    pub fn eager() -> Self {
        Self {
            eager_resolution: true,
            ..Self::default()
        }
    }

    /// Config that rejects data nested deeper than `max_depth` alias hops
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
            ..Self::default()
        }
    }

    /// Config that logs every lifecycle event
    pub fn verbose() -> Self {
        Self {
            log_level: Severity::Trace,
            ..Self::default()
        }
    }
}
