//! Error types for the dispatch protocol
//!
//! Two layers: [`DispatchError`] is what callers of the router and the
//! registries see; [`DomainError`] is how module handlers report their own
//! failures without the registry interpreting them. Every error maps to a
//! stable machine-readable kind for the wire envelope.

use thiserror::Error;

/// Well-known domain error kinds the pipeline reacts to
pub mod kinds {
    /// No playback device reachable; the episode must be deferred
    pub const NO_DEVICE: &str = "no_device";
    /// Transient failure (timeout, rate limit); a bounded retry is allowed
    pub const TRANSIENT: &str = "transient";
}

/// Errors produced by registries and the router
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    #[error("Operation already registered: {0}")]
    DuplicateName(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Operation not found: {0}")]
    NotFound(String),

    #[error("No resource matches URI: {0}")]
    ResourceNotFound(String),

    #[error("Arguments rejected for '{operation}': {detail}")]
    SchemaMismatch { operation: String, detail: String },

    /// A handler's own failure, forwarded with its kind intact
    #[error("{message}")]
    Domain { kind: String, message: String },
}

impl DispatchError {
    /// Stable kind string used in the wire error envelope
    pub fn kind(&self) -> &str {
        match self {
            DispatchError::DuplicateModule(_) => "duplicate_module",
            DispatchError::DuplicateName(_) => "duplicate_name",
            DispatchError::UnknownModule(_) => "unknown_module",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::ResourceNotFound(_) => "resource_not_found",
            DispatchError::SchemaMismatch { .. } => "schema_mismatch",
            DispatchError::Domain { kind, .. } => kind,
        }
    }

    /// Vrai pour les erreurs opérationnelles attendues, gérées par report/retry
    pub fn is_no_device(&self) -> bool {
        matches!(self, DispatchError::Domain { kind, .. } if kind == kinds::NO_DEVICE)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Domain { kind, .. } if kind == kinds::TRANSIENT)
    }
}

/// A failure reported by a module handler
///
/// The registry forwards these opaquely: the `kind` chosen by the module
/// survives unchanged through the router and into the wire envelope.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DomainError {
    pub kind: String,
    pub message: String,
}

impl DomainError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn no_device(message: impl Into<String>) -> Self {
        Self::new(kinds::NO_DEVICE, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(kinds::TRANSIENT, message)
    }
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        DispatchError::Domain {
            kind: err.kind,
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(DispatchError::UnknownModule("x".into()).kind(), "unknown_module");
        assert_eq!(DispatchError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            DispatchError::SchemaMismatch {
                operation: "op".into(),
                detail: "d".into()
            }
            .kind(),
            "schema_mismatch"
        );
    }

    #[test]
    fn domain_kind_survives_conversion() {
        let err: DispatchError = DomainError::no_device("nothing to play on").into();
        assert_eq!(err.kind(), kinds::NO_DEVICE);
        assert!(err.is_no_device());
        assert!(!err.is_transient());

        let err: DispatchError = DomainError::new("scorer", "bad json").into();
        assert_eq!(err.kind(), "scorer");
    }
}
