//! Task controller - run-level orchestration of the observe-decide-act cycle.
//!
//! The controller owns the step and failure budgets, honours pause/stop
//! signals between steps, bounds every step with the step timeout and
//! assembles the final history.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use soulpilot_core_types::{schema_of, Action, ActionCatalog, TaskId};
use soulpilot_history_store::{History, HistoryStore, SerializeOptions};

use super::batch::ActionSequenceExecutor;
use super::config::AgentLoopConfig;
use super::decision::DecisionClient;
use super::prompt::DecisionContext;
use super::state::{RunState, StepInfo};
use super::step::{DecisionCallback, StepExecutor, StepParts};
use crate::control::RunControl;
use crate::environment::{SharedEnvironment, SharedInvoker};
use crate::errors::AgentError;
use crate::events::{AgentEvent, RunEvents};
use crate::oracle::Oracle;
use crate::screenshots::ScreenshotStore;
use crate::usage::UsageTracker;

/// Called once with the final history when the task completes.
pub type DoneCallback = Arc<dyn Fn(&History) + Send + Sync>;

/// Hook invoked inline between steps.
pub type StepHook = Box<dyn FnMut(&RunState) + Send>;

/// Optional per-iteration hooks for [`TaskController::run_with_hooks`].
#[derive(Default)]
pub struct StepHooks {
    pub on_step_start: Option<StepHook>,
    pub on_step_end: Option<StepHook>,
}

/// Result of a task run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentLoopResult {
    /// How the loop ended.
    pub status: AgentLoopStatus,
    /// Run-level error, when the loop did not complete.
    pub run_error: Option<String>,
    /// Every recorded step, usage attached.
    pub history: History,
    /// Wall-clock time of the run in milliseconds.
    pub total_time_ms: u64,
}

impl AgentLoopResult {
    pub fn is_done(&self) -> bool {
        self.history.is_done()
    }

    /// Whether the task completed with a successful terminal result.
    pub fn is_success(&self) -> bool {
        matches!(self.status, AgentLoopStatus::Completed) && self.history.is_successful() == Some(true)
    }

    pub fn final_result(&self) -> Option<&str> {
        self.history.final_result()
    }
}

/// Final state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLoopStatus {
    /// A terminal result was recorded.
    Completed,
    /// `stop()` was observed before a step started.
    StoppedExternally,
    /// Too many consecutive failures.
    FailureBudgetExceeded,
    /// Ran out of steps without a terminal result.
    StepBudgetExhausted,
}

/// Drives one task from start to a final history.
pub struct TaskController {
    task: String,
    config: AgentLoopConfig,
    control: RunControl,
    events: RunEvents,
    usage: Arc<UsageTracker>,
    step: StepExecutor,
    initial_actions: Vec<Action>,
    initial_url: Option<String>,
    output_schema: Option<Value>,
    on_done: Option<DoneCallback>,
}

impl TaskController {
    pub fn builder(
        task: impl Into<String>,
        oracle: Arc<dyn Oracle>,
        env: SharedEnvironment,
        invoker: SharedInvoker,
    ) -> TaskControllerBuilder {
        TaskControllerBuilder::new(task, oracle, env, invoker)
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn task_id(&self) -> &TaskId {
        &self.step.state.task_id
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        self.step.state()
    }

    pub fn history(&self) -> &History {
        self.step.store().history()
    }

    /// Handle for pausing, resuming or stopping from outside the loop.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn events(&self) -> &RunEvents {
        &self.events
    }

    pub fn initial_actions(&self) -> &[Action] {
        &self.initial_actions
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Continue with new instructions after an earlier run.
    pub fn add_new_task(&mut self, task: impl Into<String>) {
        let task = task.into();
        info!("📝 Follow-up task: {task}");
        self.step.context.add_new_task(task.clone());
        self.step.state.follow_up_task = true;
        self.task = format!("{}\n{}", self.task, task);
    }

    pub async fn save_history(
        &self,
        path: impl AsRef<Path>,
        options: SerializeOptions,
    ) -> Result<(), AgentError> {
        let mut store = HistoryStore::from_history(self.history().clone());
        store.set_usage(self.usage.summary());
        if let Some(schema) = &self.output_schema {
            store.set_output_schema(schema.clone());
        }
        store.save_to_file(path, options).await?;
        Ok(())
    }

    pub async fn run(&mut self, max_steps: u32) -> Result<AgentLoopResult, AgentError> {
        self.run_with_hooks(max_steps, StepHooks::default()).await
    }

    /// Run until done, stopped, or out of budget.
    ///
    /// Step failures never surface as `Err`; only a failure while running
    /// the initial actions does.
    pub async fn run_with_hooks(
        &mut self,
        max_steps: u32,
        mut hooks: StepHooks,
    ) -> Result<AgentLoopResult, AgentError> {
        let started = Instant::now();
        let task_id = self.step.state.task_id.clone();
        if !self.events.is_open() {
            self.events = RunEvents::default();
            self.step.set_events(self.events.clone());
        }
        info!(task_id = %task_id.short(), "🚀 Starting task: {}", self.task);
        self.events
            .publish(AgentEvent::RunStarted {
                task_id: task_id.clone(),
                task: self.task.clone(),
            })
            .await;

        if let Err(err) = self
            .step
            .execute_initial_actions(self.initial_actions.clone(), self.initial_url.clone())
            .await
        {
            error!(error = %err, "initial actions failed");
            self.finish(&task_id, Some(err.to_string())).await;
            return Err(err);
        }
        self.step.state.session_initialized = true;

        debug!("🔄 Starting main execution loop with max {max_steps} steps...");
        let mut exit: Option<(AgentLoopStatus, Option<String>)> = None;
        for step in 0..max_steps {
            if self.control.is_paused() {
                debug!("⏸️ Step {step}: Agent paused, waiting to resume...");
                self.control.wait_until_resumed().await;
            }

            if self.step.state.consecutive_failures >= self.config.failure_limit() {
                error!(
                    "❌ Stopping due to {} consecutive failures",
                    self.config.max_failures
                );
                exit = Some((
                    AgentLoopStatus::FailureBudgetExceeded,
                    Some(format!(
                        "Stopped due to {} consecutive failures",
                        self.config.max_failures
                    )),
                ));
                break;
            }

            if self.control.is_stopped() {
                info!("🛑 Agent stopped");
                exit = Some((
                    AgentLoopStatus::StoppedExternally,
                    Some("Agent stopped programmatically".to_string()),
                ));
                break;
            }

            if let Some(hook) = hooks.on_step_start.as_mut() {
                hook(&self.step.state);
            }

            debug!("🚶 Starting step {}/{}...", step + 1, max_steps);
            let step_info = StepInfo::new(step, max_steps);
            let step_started = Utc::now();
            let outcome = tokio::time::timeout(
                self.config.step_timeout_duration(),
                self.step.execute_step(step_info),
            )
            .await;
            match outcome {
                Ok(()) => debug!("✅ Completed step {}/{}", step + 1, max_steps),
                Err(_) => self.step.record_timeout(step_info, step_started),
            }

            if let Some(hook) = hooks.on_step_end.as_mut() {
                hook(&self.step.state);
            }

            if self.history().is_done() {
                debug!("🎯 Task completed after {} steps!", step + 1);
                self.log_completion();
                if let Some(callback) = &self.on_done {
                    callback(self.history());
                }
                exit = Some((AgentLoopStatus::Completed, None));
                break;
            }
        }

        let (status, run_error) = match exit {
            Some(exit) => exit,
            None => {
                self.step.record_budget_exhausted();
                (
                    AgentLoopStatus::StepBudgetExhausted,
                    Some("Failed to complete task in maximum steps".to_string()),
                )
            }
        };

        let history = self.finish(&task_id, run_error.clone()).await;
        Ok(AgentLoopResult {
            status,
            run_error,
            history,
            total_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn finish(&mut self, task_id: &TaskId, run_error: Option<String>) -> History {
        debug!("📊 Collecting usage summary...");
        self.step.store.set_usage(self.usage.summary());
        if let Some(schema) = &self.output_schema {
            self.step.store.set_output_schema(schema.clone());
        }
        self.usage.log_summary();

        let history = self.history().clone();
        self.events
            .publish(AgentEvent::RunFinished {
                task_id: task_id.clone(),
                steps: history.len(),
                is_done: history.is_done(),
                success: history.is_successful(),
                error: run_error,
            })
            .await;
        self.events.close();
        history
    }

    fn log_completion(&self) {
        if self.history().is_successful() == Some(true) {
            info!("✅ Task completed successfully");
        } else {
            info!("❌ Task completed without success");
        }
    }
}

/// Builder for [`TaskController`].
pub struct TaskControllerBuilder {
    task: String,
    oracle: Arc<dyn Oracle>,
    env: SharedEnvironment,
    invoker: SharedInvoker,
    catalog: ActionCatalog,
    config: AgentLoopConfig,
    screenshots: Option<Arc<dyn ScreenshotStore>>,
    on_decision: Option<DecisionCallback>,
    on_done: Option<DoneCallback>,
    events: Option<RunEvents>,
    initial_actions: Vec<Action>,
    state: Option<RunState>,
    available_file_paths: Vec<String>,
    output_schema: Option<Value>,
}

impl TaskControllerBuilder {
    pub fn new(
        task: impl Into<String>,
        oracle: Arc<dyn Oracle>,
        env: SharedEnvironment,
        invoker: SharedInvoker,
    ) -> Self {
        Self {
            task: task.into(),
            oracle,
            env,
            invoker,
            catalog: ActionCatalog::new(),
            config: AgentLoopConfig::default(),
            screenshots: None,
            on_decision: None,
            on_done: None,
            events: None,
            initial_actions: Vec::new(),
            state: None,
            available_file_paths: Vec::new(),
            output_schema: None,
        }
    }

    pub fn catalog(mut self, catalog: ActionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(mut self, config: AgentLoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn screenshot_store(mut self, store: Arc<dyn ScreenshotStore>) -> Self {
        self.screenshots = Some(store);
        self
    }

    pub fn on_decision(mut self, callback: DecisionCallback) -> Self {
        self.on_decision = Some(callback);
        self
    }

    pub fn on_done(mut self, callback: DoneCallback) -> Self {
        self.on_done = Some(callback);
        self
    }

    pub fn events(mut self, events: RunEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn initial_actions(mut self, actions: Vec<Action>) -> Self {
        self.initial_actions = actions;
        self
    }

    /// Resume from an earlier run's state.
    pub fn state(mut self, state: RunState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn available_file_paths(mut self, files: Vec<String>) -> Self {
        self.available_file_paths = files;
        self
    }

    /// Bind the final answer to the schema of `T`.
    ///
    /// The terminal action then carries `data` matching that schema and
    /// [`History::structured_output`] yields it.
    pub fn output_schema<T: JsonSchema>(self) -> Self {
        self.output_schema_value(schema_of::<T>())
    }

    pub fn output_schema_value(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn build(self) -> Result<TaskController, AgentError> {
        self.config.validate()?;

        let state = self
            .state
            .unwrap_or_else(|| RunState::new(self.config.step_number_base));
        let mut initial_actions = self.initial_actions;
        let mut initial_url = None;
        if self.config.directly_open_url && !state.follow_up_task && initial_actions.is_empty() {
            if let Some(url) = extract_url_from_task(&self.task) {
                if self.catalog.get(&self.config.navigate_action).is_some() {
                    info!("🔗 Found URL in task: {url}, adding as initial action...");
                    initial_actions = vec![Action::from_value(
                        self.config.navigate_action.clone(),
                        json!({ "url": url }),
                    )
                    .map_err(AgentError::InvalidAction)?];
                    initial_url = Some(url);
                } else {
                    debug!(
                        action = %self.config.navigate_action,
                        "url found in task but the catalog has no navigation action"
                    );
                }
            }
        }

        let mut catalog = self.catalog;
        if let Some(schema) = &self.output_schema {
            debug!("binding the terminal action to the output schema");
            catalog
                .bind_output_schema(schema)
                .map_err(AgentError::InvalidAction)?;
        }
        let catalog = Arc::new(catalog);
        let control = RunControl::new();
        let events = self.events.unwrap_or_default();
        let usage = Arc::new(UsageTracker::new());

        let decision = DecisionClient::new(
            self.oracle,
            self.config.llm_timeout_duration(),
            self.config.max_actions_per_step as usize,
            self.config.url_shortening_limit,
        )
        .with_usage(usage.clone());
        let batch = ActionSequenceExecutor::new(
            self.env.clone(),
            self.invoker,
            catalog.clone(),
            control.clone(),
            self.config.wait_between_actions_duration(),
        );
        let context = DecisionContext::new(
            self.task.clone(),
            &catalog,
            self.config.max_actions_per_step,
        )
        .with_max_history_items(self.config.max_history_items);

        let step = StepExecutor::new(StepParts {
            config: self.config.clone(),
            env: self.env,
            catalog,
            decision,
            batch,
            control: control.clone(),
            events: events.clone(),
            screenshots: self.screenshots,
            on_decision: self.on_decision,
            state,
            context,
            available_file_paths: self.available_file_paths,
        });

        Ok(TaskController {
            task: self.task,
            config: self.config,
            control,
            events,
            usage,
            step,
            initial_actions,
            initial_url,
            output_schema: self.output_schema,
            on_done: self.on_done,
        })
    }
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
});

static TASK_URL_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"https?://[^\s<>"']+"#).expect("full url regex"),
        Regex::new(r#"(?:www\.)?[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*\.[a-zA-Z]{2,}(?:/[^\s<>"']*)?"#)
            .expect("domain regex"),
    ]
});

static TRAILING_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.,;:!?()\[\]]+$").expect("punctuation regex"));

/// The single URL mentioned in `task`, if there is exactly one.
pub fn extract_url_from_task(task: &str) -> Option<String> {
    let without_emails = EMAIL_PATTERN.replace_all(task, "");
    let mut found = BTreeSet::new();
    for pattern in TASK_URL_PATTERNS.iter() {
        for m in pattern.find_iter(&without_emails) {
            let url = TRAILING_PUNCTUATION.replace(m.as_str(), "");
            let url = if url.starts_with("http://") || url.starts_with("https://") {
                url.into_owned()
            } else {
                format!("https://{url}")
            };
            found.insert(url);
        }
    }

    if found.len() > 1 {
        debug!(
            "Multiple URLs found ({}), skipping directly_open_url to avoid ambiguity",
            found.len()
        );
        return None;
    }
    found.into_iter().next()
}
