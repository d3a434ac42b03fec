//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed explicitly
//! - Logs `{name}_INCOMPLETE` if dropped while still open

use std::cell::Cell;
use std::time::Instant;

/// A scope that logs start and completion of a unit of work
///
/// ```ignore
/// let scope = ObservationScope::new("DUPLICATE_PARCELS");
/// // ... do work ...
/// scope.complete(); // logs DUPLICATE_PARCELS_COMPLETE
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    started: Instant,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    ///
    /// Logs `{name}_BEGIN` immediately.
    pub fn new(name: &'a str) -> Self {
        tracing::info!(event = %format!("{}_BEGIN", name));
        Self {
            name,
            completed: Cell::new(false),
            started: Instant::now(),
        }
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.completed.set(true);
        tracing::info!(
            event = %format!("{}_COMPLETE", self.name),
            elapsed_ms = self.elapsed_ms()
        );
    }

    /// Mark the scope as completed with a row count
    pub fn complete_with_rows(self, rows: usize) {
        self.completed.set(true);
        tracing::info!(
            event = %format!("{}_COMPLETE", self.name),
            rows,
            elapsed_ms = self.elapsed_ms()
        );
    }

    /// Mark the scope as failed with a reason
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        tracing::error!(
            event = %format!("{}_FAILED", self.name),
            reason,
            elapsed_ms = self.elapsed_ms()
        );
    }

    /// Check if the scope has been closed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            tracing::warn!(
                event = %format!("{}_INCOMPLETE", self.name),
                reason = "scope dropped without completion"
            );
        }
    }
}
