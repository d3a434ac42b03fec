//! Progress status lines

use std::cell::RefCell;

/// Receives one human-readable status line at a time
pub trait StatusSink {
    fn set(&self, message: &str);
}

/// Sends status lines to the log
#[derive(Debug, Default)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn set(&self, message: &str) {
        tracing::info!(status = message);
    }
}

/// Keeps every status line, for tests and summaries
#[derive(Debug, Default)]
pub struct RecordingStatus {
    messages: RefCell<Vec<String>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.messages.borrow().last().cloned()
    }
}

impl StatusSink for RecordingStatus {
    fn set(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_status_keeps_order() {
        let status = RecordingStatus::new();
        status.set("Running A...");
        status.set("Completed A");
        assert_eq!(status.messages(), vec!["Running A...", "Completed A"]);
        assert_eq!(status.last().as_deref(), Some("Completed A"));
    }

    #[test]
    fn test_log_status_does_not_panic() {
        LogStatus.set("Running A...");
    }
}
