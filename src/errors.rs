//! Validation error types
//!
//! Configuration and report failures stop the validator that hit them.
//! Engine failures are usually caught per item inside a validator and only
//! surface here when they prevent the validator from starting at all.

use std::io;

use thiserror::Error;

use crate::engine::EngineError;

/// Errors raised by the scanner, resolver, validators and suite
#[derive(Debug, Error)]
pub enum QcError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("report error: {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl QcError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        QcError::Configuration(msg.into())
    }

    pub fn report(path: impl Into<String>, source: io::Error) -> Self {
        QcError::Report {
            path: path.into(),
            source,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QcError::Configuration(_) => "QC_CONFIGURATION",
            QcError::Engine(e) => e.code(),
            QcError::Report { .. } => "QC_REPORT_IO",
        }
    }

    /// Fatal errors end the current validator; the rest are recoverable per item
    pub fn is_fatal(&self) -> bool {
        !matches!(self, QcError::Engine(_))
    }
}

/// Result type for validation operations
pub type QcResult<T> = Result<T, QcError>;
