use std::error::Error as StdError;

use thiserror::Error;

use soulpilot_core_types::CoreError;
use soulpilot_history_store::HistoryError;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The oracle did not answer within the call-level timeout.
    #[error("LLM call timed out after {} seconds. Keep your thinking and output short.", .timeout_ms / 1000)]
    OracleTimeout { timeout_ms: u64 },

    /// The oracle answered with something that does not fit the schema.
    #[error("{0}")]
    OracleValidation(String),

    /// Transport or provider failure while calling the oracle.
    #[error("oracle request failed: {0}")]
    Oracle(String),

    /// A whole step exceeded the step-level timeout.
    #[error("Step {step} timed out after {} seconds", .timeout_ms / 1000)]
    StepTimeout { step: u32, timeout_ms: u64 },

    /// Stop or pause observed in the middle of a step.
    #[error("interrupted: {0}")]
    Interrupted(String),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("action '{action}' failed: {reason}")]
    Action { action: String, reason: String },

    #[error("invalid action: {0}")]
    InvalidAction(#[source] CoreError),

    /// A recorded element has no counterpart in the live environment.
    #[error("Could not find matching element {position} in current page")]
    ElementNotFound { position: usize },

    #[error("replay failed: {0}")]
    Replay(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    pub fn oracle(message: impl Into<String>) -> Self {
        Self::Oracle(message.into())
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment(message.into())
    }

    pub fn action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Action {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted(reason.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether a step that failed with this error counts against the
    /// consecutive-failure budget.
    pub fn counts_toward_failures(&self) -> bool {
        !matches!(self, Self::Interrupted(_))
    }
}

/// Render an error for storage in an action result.
///
/// With `verbose` the full cause chain is appended.
pub fn format_error(err: &AgentError, verbose: bool) -> String {
    let mut message = match err {
        AgentError::OracleValidation(details) => format!(
            "Invalid model output format. Please follow the correct schema.\nDetails: {details}"
        ),
        AgentError::Interrupted(reason) if reason.is_empty() => {
            "The agent was interrupted mid-step".to_string()
        }
        AgentError::Interrupted(reason) => format!("The agent was interrupted mid-step - {reason}"),
        other => other.to_string(),
    };

    if verbose {
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str("\nCaused by: ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
    }
    message
}
