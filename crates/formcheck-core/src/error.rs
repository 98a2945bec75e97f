//! Error types for the formcheck engine.
//!
//! Only caller mistakes and construction problems surface as errors.
//! Failures inside user-supplied check functions never do: they are caught
//! at the field boundary (see [`crate::field::CheckFailure`]).

use formcheck_types::UnknownLevel;

/// Errors returned by the engine's public API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// Malformed construction arguments (duplicate field, missing row
    /// identifier, empty id, ...). Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A checker was registered under a second parent, or under itself.
    #[error("invalid hierarchy: checker '{child}' cannot be registered under '{parent}'")]
    InvalidHierarchy { parent: String, child: String },

    /// The panel declares no field with this name.
    #[error("checker '{checker}' has no field '{field}'")]
    UnknownField { checker: String, field: String },

    /// An array-ed panel was addressed without a row id.
    #[error("checker '{checker}' is array-ed: a row id is required")]
    RowIdRequired { checker: String },

    /// The row identifier could not derive an id from a row context.
    #[error("checker '{checker}' could not identify row: {context}")]
    RowUnidentified { checker: String, context: String },

    /// A status or severity name could not be parsed.
    #[error(transparent)]
    UnknownLevel(#[from] UnknownLevel),

    /// A form definition document could not be read.
    #[error("form definition: {0}")]
    Definition(String),
}

impl FormError {
    pub fn config(msg: impl Into<String>) -> Self {
        FormError::Config(msg.into())
    }
}

/// Result type for engine operations.
pub type FormResult<T> = Result<T, FormError>;
