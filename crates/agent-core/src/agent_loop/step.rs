//! One observe-decide-act-record cycle.
//!
//! [`StepExecutor::execute_step`] never fails: every error raised by one of
//! its phases becomes a single erroring [`ActionResult`] and the step is
//! still finalized into the history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use soulpilot_core_types::{
    Action, ActionCatalog, ActionResult, DecisionOutput, DecisionSchema, EnvironmentSnapshot,
    EnvironmentStateHistory, ObserveOptions, SchemaOptions, StepMetadata, StepRecord,
};
use soulpilot_history_store::HistoryStore;

use super::batch::ActionSequenceExecutor;
use super::config::AgentLoopConfig;
use super::decision::DecisionClient;
use super::prompt::{failure_directive, save_conversation, DecisionContext, LAST_STEP_DIRECTIVE};
use super::state::{RunState, StepInfo};
use crate::control::RunControl;
use crate::environment::{ActionContext, SharedEnvironment};
use crate::errors::{format_error, AgentError};
use crate::events::{AgentEvent, RunEvents};
use crate::message::Message;
use crate::screenshots::ScreenshotStore;

/// Called with every fresh decision before its actions run.
pub type DecisionCallback = Arc<dyn Fn(&EnvironmentSnapshot, &DecisionOutput, u32) + Send + Sync>;

/// Diffs the environment's download list between observations.
#[derive(Debug, Clone, Default)]
pub struct DownloadTracker {
    known: Vec<String>,
}

impl DownloadTracker {
    pub fn new(initial: Vec<String>) -> Self {
        Self { known: initial }
    }

    /// Files present in `current` that were not seen before.
    pub fn update(&mut self, current: Vec<String>) -> Vec<String> {
        let new_files: Vec<String> = current
            .into_iter()
            .filter(|file| !self.known.contains(file))
            .collect();
        self.known.extend(new_files.iter().cloned());
        new_files
    }
}

/// Everything one step works on.
pub struct StepExecutor {
    config: AgentLoopConfig,
    env: SharedEnvironment,
    catalog: Arc<ActionCatalog>,
    decision: DecisionClient,
    batch: ActionSequenceExecutor,
    control: RunControl,
    events: RunEvents,
    screenshots: Option<Arc<dyn ScreenshotStore>>,
    on_decision: Option<DecisionCallback>,
    downloads: DownloadTracker,
    pub(crate) state: RunState,
    pub(crate) context: DecisionContext,
    pub(crate) store: HistoryStore,
    pub(crate) available_file_paths: Vec<String>,
}

/// Data gathered while a step runs, consumed by finalize.
#[derive(Default)]
struct StepScratch {
    snapshot: Option<EnvironmentSnapshot>,
    output: Option<DecisionOutput>,
}

pub(crate) struct StepParts {
    pub config: AgentLoopConfig,
    pub env: SharedEnvironment,
    pub catalog: Arc<ActionCatalog>,
    pub decision: DecisionClient,
    pub batch: ActionSequenceExecutor,
    pub control: RunControl,
    pub events: RunEvents,
    pub screenshots: Option<Arc<dyn ScreenshotStore>>,
    pub on_decision: Option<DecisionCallback>,
    pub state: RunState,
    pub context: DecisionContext,
    pub available_file_paths: Vec<String>,
}

impl StepExecutor {
    pub(crate) fn new(parts: StepParts) -> Self {
        Self {
            config: parts.config,
            env: parts.env,
            catalog: parts.catalog,
            decision: parts.decision,
            batch: parts.batch,
            control: parts.control,
            events: parts.events,
            screenshots: parts.screenshots,
            on_decision: parts.on_decision,
            downloads: DownloadTracker::default(),
            state: parts.state,
            context: parts.context,
            store: HistoryStore::new(),
            available_file_paths: parts.available_file_paths,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn decision_client(&self) -> &DecisionClient {
        &self.decision
    }

    pub(crate) fn set_events(&mut self, events: RunEvents) {
        self.events = events;
    }

    fn action_context(&self) -> ActionContext {
        ActionContext::new(self.state.task_id.clone(), self.state.n_steps)
            .with_files(self.available_file_paths.clone())
    }

    pub async fn execute_step(&mut self, step_info: StepInfo) {
        let started = Utc::now();
        let mut scratch = StepScratch::default();
        info!(
            task_id = %self.state.task_id.short(),
            step = self.state.n_steps,
            "📍 Step {}",
            self.state.n_steps
        );

        match self.run_phases(step_info, &mut scratch).await {
            Ok(results) => {
                self.state.last_result = results;
                self.post_process().await;
            }
            Err(err) => self.handle_step_error(err),
        }

        self.finalize(started, scratch).await;
    }

    async fn run_phases(
        &mut self,
        step_info: StepInfo,
        scratch: &mut StepScratch,
    ) -> Result<Vec<ActionResult>, AgentError> {
        let snapshot = self
            .env
            .observe(ObserveOptions::full(self.config.use_vision))
            .await?;
        scratch.snapshot = Some(snapshot.clone());
        self.check_downloads().await;

        let (messages, schema) = self.prepare(&snapshot, step_info);

        let output = self.decision.decide(&messages, &schema).await?;
        self.control.check_interrupt()?;
        self.state.last_model_output = Some(output.clone());
        scratch.output = Some(output.clone());

        if let Some(callback) = &self.on_decision {
            callback(&snapshot, &output, self.state.n_steps);
        }
        if let Some(dir) = &self.config.save_conversation_dir {
            let path = dir.join(format!(
                "conversation_{}_{}.txt",
                self.state.task_id, self.state.n_steps
            ));
            if let Err(err) = save_conversation(&messages, &output, &path).await {
                warn!(error = %err, "failed to save conversation");
            }
        }
        self.control.check_interrupt()?;

        let ctx = self.action_context();
        self.batch
            .execute_batch(&output.actions, &snapshot, &ctx, true)
            .await
    }

    /// Build the messages and schema for this step, injecting the
    /// forced-termination directive when the step or failure budget runs out.
    fn prepare(
        &self,
        snapshot: &EnvironmentSnapshot,
        step_info: StepInfo,
    ) -> (Vec<Message>, DecisionSchema) {
        let mut options = SchemaOptions {
            page_url: Some(snapshot.url.clone()),
            terminal_only: false,
            use_thinking: self.config.use_thinking,
            flash_mode: self.config.flash_mode,
        };
        let mut directives = Vec::new();

        if step_info.is_last_step() {
            info!("⚠️ Approaching last step. Only the done action is allowed.");
            directives.push(LAST_STEP_DIRECTIVE.to_string());
            options.terminal_only = true;
        }
        if self.config.final_response_after_failure
            && self.state.consecutive_failures >= self.config.max_failures
        {
            warn!(
                "⚠️ Failure limit reached ({}/{}). Forcing a final done response.",
                self.state.consecutive_failures, self.config.max_failures
            );
            directives.push(failure_directive(self.config.max_failures));
            options.terminal_only = true;
        }

        let page_actions = self.catalog.page_actions_description(&snapshot.url);
        let messages = self.context.messages(
            snapshot,
            step_info,
            &self.available_file_paths,
            page_actions.as_deref(),
            self.config.use_vision,
            &directives,
        );
        (messages, self.catalog.decision_schema(&options))
    }

    async fn check_downloads(&mut self) {
        let current = self.env.downloaded_files().await;
        for file in self.downloads.update(current) {
            info!(file = %file, "📁 Added download to available files");
            if !self.available_file_paths.contains(&file) {
                self.available_file_paths.push(file);
            }
        }
    }

    async fn post_process(&mut self) {
        self.check_downloads().await;
        let results = self.state.last_result.clone();
        self.state.record_outcome(&results);

        if let Some(last) = self.state.last_result.last().filter(|r| r.is_done) {
            info!(
                "📄 Final Result: \n{}\n",
                last.extracted_content.as_deref().unwrap_or_default()
            );
            if let Some(attachments) = last.attachments.as_ref().filter(|a| !a.is_empty()) {
                info!("👉 Attachments:");
                for file in attachments {
                    info!("  {file}");
                }
            }
        }
    }

    fn handle_step_error(&mut self, err: AgentError) {
        if !err.counts_toward_failures() {
            let message = format_error(&AgentError::interrupted(""), false);
            warn!("{message}");
            self.state.last_result = vec![ActionResult::error(message)];
            return;
        }

        let verbose = self.config.verbose_errors || tracing::enabled!(tracing::Level::DEBUG);
        let message = format_error(&err, verbose);
        self.state.consecutive_failures += 1;
        error!(
            "❌ Result failed {}/{} times:\n {}",
            self.state.consecutive_failures,
            self.config.failure_limit(),
            message
        );
        self.state.last_result = vec![ActionResult::error(message)];
    }

    async fn finalize(&mut self, started: DateTime<Utc>, scratch: StepScratch) {
        let step = self.state.n_steps;
        let screenshot_path = match (&self.screenshots, scratch.snapshot.as_ref()) {
            (Some(store), Some(snapshot)) => match snapshot.screenshot.as_deref() {
                Some(png) => match store.store(png, step).await {
                    Ok(path) => Some(path),
                    Err(err) => {
                        warn!(step, error = %err, "failed to store screenshot");
                        None
                    }
                },
                None => None,
            },
            _ => None,
        };

        let finished = Utc::now();
        let results = self.state.last_result.clone();
        let state = match scratch.snapshot.as_ref() {
            Some(snapshot) => EnvironmentStateHistory::from_snapshot(
                snapshot,
                StepRecord::interacted_elements(scratch.output.as_ref(), snapshot),
                screenshot_path,
            ),
            None => EnvironmentStateHistory {
                interacted_element: vec![None],
                ..Default::default()
            },
        };
        let record = StepRecord::new(
            scratch.output.clone(),
            results.clone(),
            state,
            Some(StepMetadata::new(step, started, finished)),
        );

        log_step_summary(step, &record);
        self.context
            .record_step(step, scratch.output.as_ref(), &results);
        let url = record.state.url.clone();
        let actions = scratch.output.as_ref().map(|o| o.actions.len()).unwrap_or(0);
        let errors = results.iter().filter(|r| r.has_error()).count();
        self.store.append(record);
        self.state.n_steps += 1;

        self.events
            .publish(AgentEvent::StepCompleted {
                task_id: self.state.task_id.clone(),
                step,
                actions,
                errors,
                url,
            })
            .await;
    }

    /// Record a step that exceeded the step timeout.
    pub(crate) fn record_timeout(&mut self, step_info: StepInfo, started: DateTime<Utc>) {
        let step = self.state.n_steps;
        let message = AgentError::StepTimeout {
            step: step_info.step_number + 1,
            timeout_ms: self.config.step_timeout_ms,
        }
        .to_string();
        error!("⏰ {message}");
        self.state.consecutive_failures += 1;
        self.state.last_result = vec![ActionResult::error(message)];
        self.context
            .record_step(step, None, &self.state.last_result);
        self.store.append(StepRecord::new(
            None,
            self.state.last_result.clone(),
            EnvironmentStateHistory {
                interacted_element: vec![None],
                ..Default::default()
            },
            Some(StepMetadata::new(step, started, Utc::now())),
        ));
        self.state.n_steps += 1;
    }

    /// Record the run-level error when the step budget ran out.
    pub(crate) fn record_budget_exhausted(&mut self) {
        let message = "Failed to complete task in maximum steps";
        info!("❌ {message}");
        self.store.append(StepRecord::new(
            None,
            vec![ActionResult::error(message)],
            EnvironmentStateHistory::default(),
            None,
        ));
    }

    /// Run the pre-loop actions and record them as step 0.
    pub(crate) async fn execute_initial_actions(
        &mut self,
        actions: Vec<Action>,
        initial_url: Option<String>,
    ) -> Result<(), AgentError> {
        if actions.is_empty() || self.state.follow_up_task {
            return Ok(());
        }
        info!(count = actions.len(), "⚡️ Executing initial actions");

        let started = Utc::now();
        let baseline = self.env.observe(ObserveOptions::cheap()).await?;
        let mut results = self
            .batch
            .execute_batch(&actions, &baseline, &self.action_context(), false)
            .await?;

        if initial_url.is_some() {
            if let Some(memory) = results.first_mut().and_then(|r| r.long_term_memory.as_mut()) {
                *memory = format!("Found initial url and automatically loaded it. {memory}");
            }
        }
        self.state.last_result = results.clone();

        let output = DecisionOutput {
            thinking: None,
            evaluation_previous_goal: Some("Starting agent with initial actions".to_string()),
            memory: Some(String::new()),
            next_goal: Some("Execute initial navigation or setup actions".to_string()),
            actions: actions.clone(),
        };
        let state = EnvironmentStateHistory {
            url: initial_url.unwrap_or_default(),
            title: "Initial Actions".to_string(),
            tabs: Vec::new(),
            interacted_element: vec![None; actions.len()],
            screenshot_path: None,
            screenshot: None,
        };
        self.context.record_step(0, Some(&output), &results);
        self.store.append(StepRecord::new(
            Some(output),
            results,
            state,
            Some(StepMetadata::new(0, started, Utc::now())),
        ));
        debug!("initial actions recorded as step 0");
        Ok(())
    }
}

fn log_step_summary(step: u32, record: &StepRecord) {
    let total = record.result.len();
    let failed = record.result.iter().filter(|r| r.has_error()).count();
    let duration = record
        .metadata
        .as_ref()
        .map(StepMetadata::duration_seconds)
        .unwrap_or_default();
    let actions = record
        .model_output
        .as_ref()
        .map(|output| {
            output
                .actions
                .iter()
                .map(|a| a.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    debug!(
        step,
        actions = %json!(actions),
        "📍 Step {}: Ran {} actions in {:.2}s: ✅ {} | ❌ {}",
        step,
        total,
        duration,
        total - failed,
        failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_tracker_reports_only_new_files() {
        let mut tracker = DownloadTracker::new(vec!["/d/a.pdf".into()]);
        assert_eq!(
            tracker.update(vec!["/d/a.pdf".into(), "/d/b.csv".into()]),
            vec!["/d/b.csv".to_string()]
        );
        assert!(tracker.update(vec!["/d/a.pdf".into(), "/d/b.csv".into()]).is_empty());
    }
}
