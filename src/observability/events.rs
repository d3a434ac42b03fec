//! Lifecycle events for a validation run
//!
//! Events are explicit and typed. Each renders as an upper-case token that
//! appears as the `event` field of the corresponding log record.

use std::fmt;

/// Observable events in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    /// Run begins
    RunStart,
    /// Run finished (some validators may have failed)
    RunComplete,

    // Configuration
    /// Settings loaded and validated
    ConfigLoaded,
    /// Settings rejected
    ConfigRejected,

    // Discovery
    /// Container scan finished
    ScanComplete,
    /// Container could not be inspected and was skipped
    ContainerSkipped,

    // Validators
    /// Validator started
    ValidatorStart,
    /// Validator finished
    ValidatorComplete,
    /// Validator aborted
    ValidatorFailed,

    // Outputs
    /// CSV report written
    ReportWritten,
    /// Empty report removed
    ReportRemoved,

    // Engine artifacts
    /// Topology staging namespace kept on request
    TopologyKept,
    /// Temporary artifact could not be removed
    CleanupFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RunStart => "RUN_BEGIN",
            Event::RunComplete => "RUN_COMPLETE",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConfigRejected => "CONFIG_REJECTED",

            Event::ScanComplete => "SCAN_COMPLETE",
            Event::ContainerSkipped => "CONTAINER_SKIPPED",

            Event::ValidatorStart => "VALIDATOR_BEGIN",
            Event::ValidatorComplete => "VALIDATOR_COMPLETE",
            Event::ValidatorFailed => "VALIDATOR_FAILED",

            Event::ReportWritten => "REPORT_WRITTEN",
            Event::ReportRemoved => "REPORT_REMOVED",

            Event::TopologyKept => "TOPOLOGY_KEPT",
            Event::CleanupFailed => "CLEANUP_FAILED",
        }
    }

    /// Returns true if this event indicates a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ConfigRejected
                | Event::ContainerSkipped
                | Event::ValidatorFailed
                | Event::CleanupFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::RunStart,
            Event::RunComplete,
            Event::ConfigLoaded,
            Event::ConfigRejected,
            Event::ScanComplete,
            Event::ContainerSkipped,
            Event::ValidatorStart,
            Event::ValidatorComplete,
            Event::ValidatorFailed,
            Event::ReportWritten,
            Event::ReportRemoved,
            Event::TopologyKept,
            Event::CleanupFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::ValidatorFailed.is_failure());
        assert!(Event::CleanupFailed.is_failure());
        assert!(!Event::RunStart.is_failure());
        assert!(!Event::ReportWritten.is_failure());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::ValidatorStart), "VALIDATOR_BEGIN");
    }
}
