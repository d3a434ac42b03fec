//! Observability for parcelqc
//!
//! - Structured logging through `tracing`
//! - Typed lifecycle events
//! - Scope-based begin/complete logging
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. Logging never changes validation results
//! 3. No background threads
//!
//! # Usage
//!
//! ```ignore
//! use parcelqc::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::ReportWritten, &[("path", "/data/small_areas_report.csv")]);
//!
//! let scope = ObservationScope::new("SMALL_AREAS");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod scope;

pub use events::Event;
pub use scope::ObservationScope;

use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when verbose.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let rendered = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");
    if event.is_failure() {
        tracing::warn!(event = event.as_str(), "{}", rendered);
    } else {
        tracing::info!(event = event.as_str(), "{}", rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(false, LogFormat::Text);
        init_logging(true, LogFormat::Json);
    }

    #[test]
    fn test_log_event() {
        log_event(Event::RunStart);
        log_event(Event::RunComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ReportWritten, &[("path", "/tmp/r.csv"), ("rows", "3")]);
        log_event_with_fields(Event::CleanupFailed, &[("dataset", "in_memory/x")]);
    }
}
