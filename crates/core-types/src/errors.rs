use thiserror::Error;

/// Errors raised while building or validating the shared data model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid parameters for action '{action}': {reason}")]
    InvalidParams { action: String, reason: String },

    #[error("parameter schema of action '{action}' does not compile: {reason}")]
    InvalidSchema { action: String, reason: String },

    #[error("malformed action: {0}")]
    MalformedAction(String),

    #[error("invalid decision output: {0}")]
    InvalidDecision(String),

    #[error("invalid action result: {0}")]
    InvalidResult(String),

    #[error("action '{0}' is already registered")]
    DuplicateAction(String),
}

impl CoreError {
    pub fn invalid_params(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_schema(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_decision(reason: impl Into<String>) -> Self {
        Self::InvalidDecision(reason.into())
    }
}
