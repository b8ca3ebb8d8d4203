use std::sync::Arc;

use thiserror::Error;

use super::ActionName;

/// Error type actions return on rejection.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Rejection value carried by an ErrorRecord.
///
/// Whatever the action rejected with, shared so snapshots stay cheap to clone.
/// The core never classifies it.
pub type Reason = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ReducerError {
    #[error("action '{0}' is already registered")]
    DuplicateAction(ActionName),

    #[error("invalid arguments for action '{action}': {message}")]
    InvalidArgs { action: ActionName, message: String },

    #[error("failed to encode action arguments: {0}")]
    ArgsEncode(String),

    #[error("action '{action}' panicked: {message}")]
    ActionPanicked { action: ActionName, message: String },

    #[error("a tokio runtime is required to build a reducer")]
    NoRuntime,

    #[error("{0} is no longer the current failure")]
    StaleFailure(crate::domain::FailureId),

    #[error("recovery of {0} has already been started")]
    RecoveryInProgress(crate::domain::FailureId),

    #[error("reducer has been disposed")]
    Disposed,
}

impl ReducerError {
    /// Wrap a core-originated rejection so it can travel as a `Reason`.
    pub fn into_reason(self) -> Reason {
        Arc::new(self)
    }
}
