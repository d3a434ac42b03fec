//! CLI-specific error types
//!
//! Every CLI error ends the process with exit status 1.

use std::fmt;
use std::io;

use crate::errors::QcError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Bad settings or arguments
    ConfigError,
    /// I/O error (stdout or reports)
    IoError,
    /// A validator could not start or engine work failed outright
    ValidationError,
    /// The run finished but some validators failed
    Incomplete,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "QC_CLI_CONFIG_ERROR",
            Self::IoError => "QC_CLI_IO_ERROR",
            Self::ValidationError => "QC_CLI_VALIDATION_ERROR",
            Self::Incomplete => "QC_CLI_INCOMPLETE",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Some selected validators did not complete
    pub fn incomplete(failed: usize, selected: usize) -> Self {
        Self::new(
            CliErrorCode::Incomplete,
            format!("{} of {} selected validations failed", failed, selected),
        )
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QcError> for CliError {
    fn from(e: QcError) -> Self {
        let code = match &e {
            QcError::Configuration(_) => CliErrorCode::ConfigError,
            QcError::Report { .. } => CliErrorCode::IoError,
            QcError::Engine(_) => CliErrorCode::ValidationError,
        };
        Self::new(code, format!("[{}] {}", e.code(), e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_qc_error() {
        let err: CliError = QcError::configuration("bad scale").into();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert!(err.message().contains("QC_CONFIGURATION"));
        assert!(err.to_string().starts_with("QC_CLI_CONFIG_ERROR: "));
    }

    #[test]
    fn test_incomplete_message() {
        let err = CliError::incomplete(2, 12);
        assert_eq!(err.code_str(), "QC_CLI_INCOMPLETE");
        assert_eq!(err.message(), "2 of 12 selected validations failed");
    }
}
