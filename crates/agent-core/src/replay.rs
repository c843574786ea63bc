//! Re-executing a recorded history against a live environment.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use soulpilot_core_types::{
    Action, ActionCatalog, ActionResult, EnvironmentSnapshot, InteractedElement, ObserveOptions,
    StepRecord, TaskId,
};
use soulpilot_history_store::{History, HistoryStore};

use crate::agent_loop::batch::ActionSequenceExecutor;
use crate::agent_loop::config::ReplayOptions;
use crate::control::RunControl;
use crate::environment::{ActionContext, SharedEnvironment, SharedInvoker};
use crate::errors::AgentError;

/// Replays recorded steps, rebinding element indices by identity.
pub struct ReplayEngine {
    batch: ActionSequenceExecutor,
    task_id: TaskId,
}

impl ReplayEngine {
    pub fn new(env: SharedEnvironment, invoker: SharedInvoker, catalog: Arc<ActionCatalog>) -> Self {
        Self::with_control(env, invoker, catalog, RunControl::new())
    }

    /// Share a control handle so a replay can be stopped from outside.
    pub fn with_control(
        env: SharedEnvironment,
        invoker: SharedInvoker,
        catalog: Arc<ActionCatalog>,
        control: RunControl,
    ) -> Self {
        Self {
            batch: ActionSequenceExecutor::new(env, invoker, catalog, control, Duration::ZERO),
            task_id: TaskId::new(),
        }
    }

    pub async fn load_and_replay(
        &self,
        path: impl AsRef<Path>,
        options: &ReplayOptions,
    ) -> Result<Vec<ActionResult>, AgentError> {
        let store = HistoryStore::load_from_file(path, Some(self.batch.catalog().as_ref())).await?;
        self.replay(store.history(), options).await
    }

    /// Replay every step that carries a decision.
    ///
    /// A step whose element cannot be found on the current page fails the
    /// replay at once. Other failures are retried up to `max_retries` times
    /// and then either recorded or returned, per `skip_failures`.
    pub async fn replay(
        &self,
        history: &History,
        options: &ReplayOptions,
    ) -> Result<Vec<ActionResult>, AgentError> {
        let total = history.len();
        let mut results = Vec::new();

        for (i, record) in history.history.iter().enumerate() {
            let step_number = record
                .metadata
                .as_ref()
                .map(|m| m.step_number)
                .unwrap_or(i as u32);
            let step_name = if step_number == 0 {
                "Initial actions".to_string()
            } else {
                format!("Step {step_number}")
            };
            let goal = record
                .model_output
                .as_ref()
                .and_then(|o| o.next_goal.as_deref())
                .unwrap_or_default();
            info!("Replaying {step_name} ({}/{total}): {goal}", i + 1);

            let replayable = record
                .model_output
                .as_ref()
                .map(|o| o.actions.iter().any(|a| !a.is_empty()))
                .unwrap_or(false);
            if !replayable {
                warn!("{step_name}: No action to replay, skipping");
                results.push(ActionResult::error("No action to replay"));
                continue;
            }

            let mut attempt = 0;
            loop {
                attempt += 1;
                match self.execute_history_step(record, i as u32, options.delay()).await {
                    Ok(step_results) => {
                        results.extend(step_results);
                        break;
                    }
                    Err(err @ AgentError::ElementNotFound { .. }) => {
                        error!("{step_name}: {err}");
                        return Err(err);
                    }
                    Err(err) if attempt >= options.max_retries.max(1) => {
                        let message =
                            format!("{step_name} failed after {attempt} attempts: {err}");
                        error!("{message}");
                        if !options.skip_failures {
                            return Err(AgentError::Replay(message));
                        }
                        results.push(ActionResult::error(message));
                        break;
                    }
                    Err(err) => {
                        warn!(
                            error = %err,
                            "{step_name} failed (attempt {attempt}/{}), retrying...",
                            options.max_retries
                        );
                        tokio::time::sleep(options.delay()).await;
                    }
                }
            }
        }

        Ok(results)
    }

    async fn execute_history_step(
        &self,
        record: &StepRecord,
        step: u32,
        delay: Duration,
    ) -> Result<Vec<ActionResult>, AgentError> {
        let Some(output) = record.model_output.as_ref() else {
            return Err(AgentError::Replay("step has no recorded decision".to_string()));
        };
        let snapshot = self.batch.env().observe(ObserveOptions::cheap()).await?;

        let mut actions = Vec::with_capacity(output.actions.len());
        for (position, action) in output.actions.iter().enumerate() {
            let historical = record
                .state
                .interacted_element
                .get(position)
                .and_then(Option::as_ref);
            let rebound = rebind(historical, action, &snapshot)
                .ok_or(AgentError::ElementNotFound { position })?;
            actions.push(rebound);
        }

        let ctx = ActionContext::new(self.task_id.clone(), step);
        let results = self.batch.execute_batch(&actions, &snapshot, &ctx, true).await?;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(results)
    }
}

/// Point `action` at the element in `snapshot` that matches `historical`.
///
/// Actions that targeted no element, or pages with no indexed elements, pass
/// through unchanged. `None` means the element is gone.
pub fn rebind(
    historical: Option<&InteractedElement>,
    action: &Action,
    snapshot: &EnvironmentSnapshot,
) -> Option<Action> {
    let Some(historical) = historical else {
        return Some(action.clone());
    };
    if snapshot.elements.is_empty() {
        return Some(action.clone());
    }

    let (index, _) = snapshot.find_by_identity(&historical.element_hash)?;
    let mut rebound = action.clone();
    let old_index = action.index();
    if old_index != Some(index) {
        rebound.set_index(index);
        info!(
            "Element moved in DOM, updated index from {} to {index}",
            old_index.map(|i| i.to_string()).unwrap_or_else(|| "none".to_string())
        );
    }
    Some(rebound)
}
