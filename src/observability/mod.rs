//! Observability for the schema engine
//!
//! - Structured logging (JSON lines on stderr)
//! - Typed lifecycle events for scopes, alias resolution and compilation
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on parsing or validation
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aeroschema::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Trace);
//! log_event_with_fields(Event::AliasResolved, &[("alias", "user")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
