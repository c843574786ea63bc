use async_trait::async_trait;
use serde_json::Value;

use soulpilot_core_types::{DecisionSchema, TokenUsage};

use crate::errors::AgentError;
use crate::message::Message;

/// Raw answer of one oracle round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleResponse {
    /// Structured completion, validated by the caller against the schema.
    pub completion: Value,
    pub usage: Option<TokenUsage>,
}

impl OracleResponse {
    pub fn new(completion: Value) -> Self {
        Self {
            completion,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Abstraction over the decision-making service so any vendor can drive the loop.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Name used for usage accounting.
    fn model_name(&self) -> &str;

    /// Ask for the next decision given the conversation so far.
    ///
    /// Implementations should request output matching `schema` and return
    /// the structured completion untouched; validation happens in
    /// [`DecisionClient`](crate::agent_loop::DecisionClient).
    async fn complete(
        &self,
        messages: &[Message],
        schema: &DecisionSchema,
    ) -> Result<OracleResponse, AgentError>;
}
