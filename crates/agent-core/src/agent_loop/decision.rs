//! One oracle round-trip with timeout, empty-decision retry and URL restoration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use soulpilot_core_types::{Action, DecisionOutput, DecisionSchema};

use super::prompt::EMPTY_ACTION_CLARIFICATION;
use crate::errors::AgentError;
use crate::message::Message;
use crate::oracle::Oracle;
use crate::url_shortener::{RestoreUrls, UrlShortener};
use crate::usage::UsageTracker;

pub struct DecisionClient {
    oracle: Arc<dyn Oracle>,
    shortener: UrlShortener,
    llm_timeout: Duration,
    max_actions: usize,
    usage: Arc<UsageTracker>,
}

impl DecisionClient {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        llm_timeout: Duration,
        max_actions: usize,
        url_shortening_limit: usize,
    ) -> Self {
        Self {
            oracle,
            shortener: UrlShortener::new(url_shortening_limit),
            llm_timeout,
            max_actions,
            usage: Arc::new(UsageTracker::new()),
        }
    }

    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn model_name(&self) -> &str {
        self.oracle.model_name()
    }

    /// Ask for the next decision.
    ///
    /// The whole exchange, retry included, is bounded by the call timeout.
    /// The returned decision always holds at least one action.
    pub async fn decide(
        &self,
        messages: &[Message],
        schema: &DecisionSchema,
    ) -> Result<DecisionOutput, AgentError> {
        match tokio::time::timeout(self.llm_timeout, self.decide_with_retry(messages, schema)).await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::OracleTimeout {
                timeout_ms: self.llm_timeout.as_millis() as u64,
            }),
        }
    }

    async fn decide_with_retry(
        &self,
        messages: &[Message],
        schema: &DecisionSchema,
    ) -> Result<DecisionOutput, AgentError> {
        let output = self.request(messages, schema).await?;
        if !output.has_no_actions() {
            return Ok(output);
        }

        warn!("Model returned empty action. Retrying...");
        let mut retry_messages = messages.to_vec();
        retry_messages.push(Message::user(EMPTY_ACTION_CLARIFICATION));
        let retried = self.request(&retry_messages, schema).await?;
        if !retried.has_no_actions() {
            return Ok(retried);
        }

        warn!("Model still returned empty after retry. Inserting safe noop action.");
        Ok(DecisionOutput {
            actions: vec![Action::done(false, "No next action returned by LLM!")],
            ..retried
        })
    }

    async fn request(
        &self,
        messages: &[Message],
        schema: &DecisionSchema,
    ) -> Result<DecisionOutput, AgentError> {
        let (shortened, replacements) = self.shortener.shorten_messages(messages);
        if !replacements.is_empty() {
            debug!(count = replacements.len(), "shortened long urls in messages");
        }

        let response = self.oracle.complete(&shortened, schema).await?;
        if let Some(usage) = response.usage.as_ref() {
            self.usage.record(self.oracle.model_name(), usage);
        }

        let mut output = schema
            .parse(response.completion)
            .map_err(|err| AgentError::OracleValidation(err.to_string()))?
            .restore_urls(&replacements);

        output.drop_empty_actions();
        let dropped = output.truncate_actions(self.max_actions);
        if dropped > 0 {
            debug!(
                dropped,
                max = self.max_actions,
                "decision exceeded max actions per step, truncated"
            );
        }
        log_decision(&output);
        Ok(output)
    }
}

fn log_decision(output: &DecisionOutput) {
    if let Some(thinking) = output.thinking.as_deref() {
        debug!("💡 Thinking:\n{thinking}");
    }
    if let Some(eval) = output.evaluation_previous_goal.as_deref().filter(|s| !s.is_empty()) {
        let lower = eval.to_lowercase();
        if lower.contains("success") {
            info!("  👍 Eval: {eval}");
        } else if lower.contains("failure") {
            info!("  ⚠️ Eval: {eval}");
        } else {
            info!("  ❔ Eval: {eval}");
        }
    }
    if let Some(memory) = output.memory.as_deref().filter(|s| !s.is_empty()) {
        info!("  🧠 Memory: {memory}");
    }
    if let Some(goal) = output.next_goal.as_deref().filter(|s| !s.is_empty()) {
        info!("  🎯 Next goal: {goal}");
    }
}
