//! Error types for vigil-script

use thiserror::Error;

/// Schema loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error(transparent)]
    Core(#[from] vigil_core::Error),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("Class {class} derives from unknown class {parent}")]
    UnknownParent { class: String, parent: String },

    #[error("Inheritance cycle through class {0}")]
    InheritanceCycle(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
