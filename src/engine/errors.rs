//! # Engine Errors
//!
//! Failures reported by a spatial engine while executing one primitive.
//! These are per-item errors: validators catch them, log them and move on.

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Dataset already exists: {0}")]
    AlreadyExists(String),

    #[error("Field not found: {field} in {dataset}")]
    FieldNotFound { dataset: String, field: String },

    #[error("Invalid geometry in {0}")]
    InvalidGeometry(String),

    #[error("Invalid cluster tolerance: {0}")]
    InvalidTolerance(f64),

    #[error("{operation} failed on {target}: {message}")]
    Operation {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("Container unreadable: {0}")]
    Unreadable(String),
}

impl EngineError {
    /// Create an operation failure
    pub fn operation(
        operation: &'static str,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Operation {
            operation,
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a field-not-found error
    pub fn field_not_found(dataset: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            dataset: dataset.into(),
            field: field.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "QC_ENGINE_NOT_FOUND",
            EngineError::AlreadyExists(_) => "QC_ENGINE_ALREADY_EXISTS",
            EngineError::FieldNotFound { .. } => "QC_ENGINE_FIELD_NOT_FOUND",
            EngineError::InvalidGeometry(_) => "QC_ENGINE_INVALID_GEOMETRY",
            EngineError::InvalidTolerance(_) => "QC_ENGINE_INVALID_TOLERANCE",
            EngineError::Operation { .. } => "QC_ENGINE_OPERATION_FAILED",
            EngineError::Unreadable(_) => "QC_ENGINE_UNREADABLE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            EngineError::NotFound("x".into()).code(),
            "QC_ENGINE_NOT_FOUND"
        );
        assert_eq!(
            EngineError::InvalidTolerance(0.0).code(),
            "QC_ENGINE_INVALID_TOLERANCE"
        );
    }

    #[test]
    fn test_operation_display() {
        let err = EngineError::operation("Intersect", "a.mdb/Parcel", "boom");
        assert_eq!(err.to_string(), "Intersect failed on a.mdb/Parcel: boom");
    }
}
