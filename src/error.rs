//! Errors raised by render, capture, resolution and schema construction.
//!
//! Nothing here is recovered inside the crate: malformed input and malformed
//! schemas are the caller's to handle.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input ran out, or was too short for a field that needs bytes.
    #[error("incomplete capture: {0}")]
    IncompleteCapture(String),
    /// A deferred reference names a node that cannot be found, or was used
    /// on a node with no parent.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    /// Reserved field name, missing or contradictory constructor option.
    #[error("schema: {0}")]
    Schema(String),
    /// A decoded key maps to no known type and no default exists.
    #[error("dispatch: {0}")]
    Dispatch(String),
    /// A value that cannot be stored in, or parsed for, the target field.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

impl Error {
    pub(crate) fn incomplete(what: impl Into<String>) -> Self {
        Error::IncompleteCapture(what.into())
    }

    pub(crate) fn unresolved(what: impl Into<String>) -> Self {
        Error::UnresolvedReference(what.into())
    }

    /// Prefix the message with where in the tree it happened, keeping the kind.
    pub(crate) fn context(self, at: &str) -> Self {
        match self {
            Error::IncompleteCapture(m) => Error::IncompleteCapture(format!("{}: {}", at, m)),
            Error::UnresolvedReference(m) => Error::UnresolvedReference(format!("{}: {}", at, m)),
            Error::Schema(m) => Error::Schema(format!("{}: {}", at, m)),
            Error::Dispatch(m) => Error::Dispatch(format!("{}: {}", at, m)),
            Error::InvalidValue(m) => Error::InvalidValue(format!("{}: {}", at, m)),
            Error::InvalidSelector(m) => Error::InvalidSelector(m),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
