use hololith_core::{QuotaViolation, ValidationError};
use hololith_store::StoreError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input. Raised before any write.
    #[error("{0}")]
    InvalidInput(String),

    /// The referenced entity is absent, or is not visible to the caller.
    #[error("{0}")]
    NotFound(String),

    /// The entity belongs to another tenant, or the caller lacks the role.
    #[error("{0}")]
    Forbidden(String),

    /// A plan limit would be exceeded.
    #[error(transparent)]
    QuotaExceeded(#[from] QuotaViolation),

    /// Data consistency violation. Never shown to callers verbatim.
    #[error("internal error: {0}")]
    Internal(String),

    /// A repository call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidInput(e.0)
    }
}

impl EngineError {
    /// Turn a unique-constraint conflict into a client-facing message.
    pub(crate) fn conflict_as(message: &str) -> impl FnOnce(StoreError) -> Self + '_ {
        move |e| match e {
            StoreError::Conflict(_) => Self::InvalidInput(message.to_owned()),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_message_is_passed_through() {
        let err = EngineError::from(QuotaViolation::MaxStores(1));
        assert!(err.to_string().contains("maxStores=1"));
    }

    #[test]
    fn conflicts_become_invalid_input() {
        let map = EngineError::conflict_as("Tag slug already exists");
        let err = map(StoreError::Conflict("tag slug already in use".into()));
        assert!(matches!(err, EngineError::InvalidInput(m) if m == "Tag slug already exists"));

        let map = EngineError::conflict_as("unused");
        assert!(matches!(
            map(StoreError::Backend("down".into())),
            EngineError::Store(_)
        ));
    }
}
