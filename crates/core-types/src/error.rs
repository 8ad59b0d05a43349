use serde::Serialize;

/// The error taxonomy shared by every crate in the workspace. Crate-local
/// error types wrap this where a failure crosses a component boundary;
/// purely-internal failures with no boundary-facing meaning (e.g. a bad
/// regex in config validation) stay as crate-local variants instead.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("provider returned unparseable payload: {0}")]
    ProviderInvalid(String),

    #[error("integrity conflict: {0}")]
    IntegrityConflict(String),

    #[error("strategy intent rejected: {0}")]
    StrategyReject(String),

    #[error("internal invariant violated: {0}")]
    InternalAssert(String),
}

impl CoreError {
    /// Whether a caller should retry this error (§7: `Transient` and, once,
    /// `IntegrityConflict`).
    pub fn retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_) | CoreError::IntegrityConflict(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "InvalidInput",
            CoreError::NotFound(_) => "NotFound",
            CoreError::Transient(_) => "Transient",
            CoreError::ProviderInvalid(_) => "ProviderInvalid",
            CoreError::IntegrityConflict(_) => "IntegrityConflict",
            CoreError::StrategyReject(_) => "StrategyReject",
            CoreError::InternalAssert(_) => "InternalAssert",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_conflict_are_retryable() {
        assert!(CoreError::Transient("timeout".into()).retryable());
        assert!(CoreError::IntegrityConflict("dup".into()).retryable());
        assert!(!CoreError::InvalidInput("bad".into()).retryable());
        assert!(!CoreError::InternalAssert("low>high".into()).retryable());
    }
}
