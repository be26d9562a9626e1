//! Error types for vigil-core

use crate::ObjectId;
use thiserror::Error;

/// Core error type
///
/// Evaluation failures are ordinary results: an expression that cannot be
/// evaluated right now (its object is gone, a type does not line up) reports
/// why and leaves no value behind. The remaining variants are raised when
/// building expressions, classes and bindings, or by the object system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Referenced object has been destroyed")]
    ObjectDestroyed,

    #[error("No object to look up property `{0}` on")]
    NoSourceObject(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    /// A value handed to a constructor or setter does not fit its type
    #[error("Invalid value: expected {expected}, got {got}")]
    InvalidValue { expected: String, got: String },

    #[error("Closure produced no value")]
    ClosureFailed,

    #[error("Watch has been removed")]
    Unwatched,

    #[error("Property not found: {class}.{property}")]
    PropertyNotFound { class: String, property: String },

    #[error("Property {class}.{property} is not readable")]
    PropertyNotReadable { class: String, property: String },

    #[error("Property {class}.{property} is not writable")]
    PropertyNotWritable { class: String, property: String },

    #[error("Duplicate property: {class}.{property}")]
    DuplicateProperty { class: String, property: String },

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Duplicate class: {0}")]
    DuplicateClass(String),

    #[error("Object {0} has been disposed")]
    ObjectDisposed(ObjectId),
}

impl Error {
    /// Whether this error can be produced by evaluating an expression
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(
            self,
            Error::ObjectDestroyed
                | Error::NoSourceObject(_)
                | Error::TypeError { .. }
                | Error::ClosureFailed
                | Error::Unwatched
                | Error::PropertyNotReadable { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_errors_are_not_evaluation_failures() {
        let evaluation = Error::TypeError {
            expected: "int".into(),
            got: "string".into(),
        };
        let construction = Error::InvalidValue {
            expected: "int".into(),
            got: "string".into(),
        };
        assert!(evaluation.is_evaluation_failure());
        assert!(!construction.is_evaluation_failure());
        assert!(!Error::ClassNotFound("Window".into()).is_evaluation_failure());
        assert!(Error::ObjectDestroyed.is_evaluation_failure());
    }
}
