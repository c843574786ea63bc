//! Deterministic collaborators for tests and local dry runs.
//!
//! Each double plays back a script and records what it was asked to do, so
//! tests can drive a whole run without a model or a browser.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use soulpilot_core_types::{
    Action, ActionResult, DecisionSchema, EnvironmentSnapshot, ObserveOptions, TokenUsage,
};

use crate::environment::{ActionContext, ActionInvoker, Environment};
use crate::errors::AgentError;
use crate::message::Message;
use crate::oracle::{Oracle, OracleResponse};

/// Build a raw completion for `actions` the way a model would return it.
pub fn completion(next_goal: &str, actions: &[Action]) -> Value {
    json!({
        "evaluation_previous_goal": "Unknown",
        "memory": "",
        "next_goal": next_goal,
        "action": actions.iter().map(Action::to_value).collect::<Vec<_>>(),
    })
}

/// Oracle that answers from a queue of scripted replies.
pub struct ScriptedOracle {
    model: String,
    replies: Mutex<VecDeque<Result<OracleResponse, AgentError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
    offered: Mutex<Vec<Vec<String>>>,
    delay: Duration,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            model: "scripted".to_string(),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            offered: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reply(self, completion: Value) -> Self {
        self.replies
            .lock()
            .push_back(Ok(OracleResponse::new(completion).with_usage(TokenUsage::new(100, 20))));
        self
    }

    pub fn reply_actions(self, actions: Vec<Action>) -> Self {
        let value = completion("continue", &actions);
        self.reply(value)
    }

    pub fn fail(self, err: AgentError) -> Self {
        self.replies.lock().push_back(Err(err));
        self
    }

    /// Messages received by each call, in order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Action names the decision schema allowed on each call, in order.
    pub fn offered_actions(&self) -> Vec<Vec<String>> {
        self.offered.lock().clone()
    }
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        schema: &DecisionSchema,
    ) -> Result<OracleResponse, AgentError> {
        self.calls.lock().push(messages.to_vec());
        self.offered
            .lock()
            .push(schema.allowed_actions().map(str::to_string).collect());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::oracle("script exhausted")))
    }
}

/// Environment that returns scripted snapshots, one per observation.
///
/// The last scripted snapshot keeps being returned once the queue runs dry.
pub struct ScriptedEnvironment {
    snapshots: Mutex<VecDeque<Result<EnvironmentSnapshot, String>>>,
    last: Mutex<EnvironmentSnapshot>,
    observations: Mutex<Vec<ObserveOptions>>,
    downloads: Mutex<Vec<String>>,
}

impl ScriptedEnvironment {
    pub fn new(initial: EnvironmentSnapshot) -> Self {
        Self {
            snapshots: Mutex::new(VecDeque::new()),
            last: Mutex::new(initial),
            observations: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, snapshot: EnvironmentSnapshot) -> Self {
        self.snapshots.lock().push_back(Ok(snapshot));
        self
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.snapshots.lock().push_back(Err(message.into()));
        self
    }

    pub fn add_download(&self, path: impl Into<String>) {
        self.downloads.lock().push(path.into());
    }

    pub fn observation_count(&self) -> usize {
        self.observations.lock().len()
    }

    pub fn observations(&self) -> Vec<ObserveOptions> {
        self.observations.lock().clone()
    }
}

#[async_trait]
impl Environment for ScriptedEnvironment {
    async fn observe(&self, options: ObserveOptions) -> Result<EnvironmentSnapshot, AgentError> {
        self.observations.lock().push(options);
        let next = self.snapshots.lock().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock() = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(message)) => Err(AgentError::environment(message)),
            None => Ok(self.last.lock().clone()),
        }
    }

    async fn downloaded_files(&self) -> Vec<String> {
        self.downloads.lock().clone()
    }
}

/// Invoker that records every action and answers from a script.
///
/// Without a scripted answer, `done` yields its terminal result and any
/// other action a plain "ran" result.
pub struct RecordingInvoker {
    executed: Mutex<Vec<Action>>,
    answers: Mutex<VecDeque<Result<ActionResult, String>>>,
    delay: Duration,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            answers: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn answer(self, result: ActionResult) -> Self {
        self.answers.lock().push_back(Ok(result));
        self
    }

    /// Make the next call fail as an environment failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.answers.lock().push_back(Err(message.into()));
        self
    }

    pub fn executed(&self) -> Vec<Action> {
        self.executed.lock().clone()
    }

    pub fn executed_names(&self) -> Vec<String> {
        self.executed
            .lock()
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }
}

impl Default for RecordingInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionInvoker for RecordingInvoker {
    async fn execute(
        &self,
        action: &Action,
        _env: &dyn Environment,
        _ctx: &ActionContext,
    ) -> Result<ActionResult, AgentError> {
        self.executed.lock().push(action.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.answers.lock().pop_front();
        match scripted {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(AgentError::environment(message)),
            None if action.is_done() => {
                let success = action
                    .param("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(ActionResult::done(success, action.done_text().unwrap_or_default()))
            }
            None => Ok(ActionResult::extracted(format!("ran {}", action.summary()))),
        }
    }
}
