//! Observability for the commit pipeline
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Lock-free counters
//!
//! Observability is read-only: nothing here can fail or alter a commit.
//!
//! ```ignore
//! use commitguard::observability::{log_event_with_fields, Event, Logger};
//!
//! Logger::info("QUERY_COMPLETE", &[("rows", "42")]);
//! log_event_with_fields(Event::ConflictDetected, &[("entity", "account")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_LEVEL_ENV};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
///
/// Failure events are logged at WARN, everything else at INFO.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
