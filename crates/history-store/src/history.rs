//! The ordered list of step records produced by a run, plus the read-side
//! queries callers use to inspect it.

use jsonschema::{Draft, JSONSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use soulpilot_core_types::{
    Action, ActionResult, DecisionOutput, InteractedElement, StepRecord, UsageSummary,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub history: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSummary>,
    /// Schema the final result was bound to, if the run asked for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// An action as it appears in history, joined with the element it hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedAction {
    pub action: Action,
    pub interacted_element: Option<InteractedElement>,
    /// Memory note of the matching result, filled by [`History::action_history`].
    pub result: Option<String>,
}

/// Reasoning fields of one decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Thought<'a> {
    pub thinking: Option<&'a str>,
    pub evaluation_previous_goal: Option<&'a str>,
    pub memory: Option<&'a str>,
    pub next_goal: Option<&'a str>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: StepRecord) {
        self.history.push(record);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn number_of_steps(&self) -> usize {
        self.len()
    }

    fn last_result(&self) -> Option<&ActionResult> {
        self.history.last().and_then(|step| step.result.last())
    }

    /// Whether the last result of the last step is terminal.
    pub fn is_done(&self) -> bool {
        self.last_result().map(|r| r.is_done).unwrap_or(false)
    }

    /// Success flag of the terminal result; `None` when not done.
    pub fn is_successful(&self) -> Option<bool> {
        self.last_result()
            .filter(|r| r.is_done)
            .and_then(|r| r.success)
    }

    pub fn final_result(&self) -> Option<&str> {
        self.last_result().and_then(|r| r.extracted_content.as_deref())
    }

    /// The final result parsed into `T`.
    ///
    /// Only available when the run was bound to an output schema and the
    /// final result satisfies it.
    pub fn structured_output<T: DeserializeOwned>(&self) -> Option<T> {
        let schema = self.output_schema.as_ref()?;
        let value: Value = serde_json::from_str(self.final_result()?).ok()?;
        let compiled = match JSONSchema::options().with_draft(Draft::Draft7).compile(schema) {
            Ok(compiled) => compiled,
            Err(err) => {
                debug!(error = %err, "output schema does not compile");
                return None;
            }
        };
        if !compiled.is_valid(&value) {
            debug!("final result does not match the output schema");
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// First error of each step, `None` for clean steps.
    pub fn errors(&self) -> Vec<Option<&str>> {
        self.history.iter().map(StepRecord::first_error).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().iter().any(Option::is_some)
    }

    pub fn urls(&self) -> Vec<&str> {
        self.history.iter().map(|step| step.state.url.as_str()).collect()
    }

    /// Screenshot paths of the last `n_last` steps (all when `None`).
    ///
    /// With `keep_missing`, steps without a screenshot yield `None` instead
    /// of being skipped.
    pub fn screenshot_paths(&self, n_last: Option<usize>, keep_missing: bool) -> Vec<Option<&str>> {
        let skip = n_last
            .map(|n| self.history.len().saturating_sub(n))
            .unwrap_or(0);
        self.history[skip..]
            .iter()
            .map(|step| step.state.screenshot_path.as_deref())
            .filter(|path| keep_missing || path.is_some())
            .collect()
    }

    pub fn model_outputs(&self) -> Vec<&DecisionOutput> {
        self.history
            .iter()
            .filter_map(|step| step.model_output.as_ref())
            .collect()
    }

    pub fn model_thoughts(&self) -> Vec<Thought<'_>> {
        self.model_outputs()
            .into_iter()
            .map(|output| Thought {
                thinking: output.thinking.as_deref(),
                evaluation_previous_goal: output.evaluation_previous_goal.as_deref(),
                memory: output.memory.as_deref(),
                next_goal: output.next_goal.as_deref(),
            })
            .collect()
    }

    fn joined_actions(step: &StepRecord) -> Vec<RecordedAction> {
        let Some(output) = &step.model_output else {
            return Vec::new();
        };
        output
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| RecordedAction {
                action: action.clone(),
                interacted_element: step.state.interacted_element.get(i).cloned().flatten(),
                result: None,
            })
            .collect()
    }

    /// Every requested action across the run, in order.
    pub fn model_actions(&self) -> Vec<RecordedAction> {
        self.history.iter().flat_map(Self::joined_actions).collect()
    }

    pub fn model_actions_filtered(&self, include: &[&str]) -> Vec<RecordedAction> {
        self.model_actions()
            .into_iter()
            .filter(|entry| include.contains(&entry.action.name()))
            .collect()
    }

    /// Actions grouped per step, each joined with its result's memory note.
    ///
    /// Actions that never produced a result are left out.
    pub fn action_history(&self) -> Vec<Vec<RecordedAction>> {
        self.history
            .iter()
            .map(|step| {
                Self::joined_actions(step)
                    .into_iter()
                    .zip(step.result.iter())
                    .map(|(mut entry, result)| {
                        entry.result = result.long_term_memory.clone();
                        entry
                    })
                    .collect()
            })
            .collect()
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.model_outputs()
            .into_iter()
            .flat_map(|output| output.actions.iter())
            .filter(|action| !action.is_empty())
            .map(Action::name)
            .collect()
    }

    pub fn action_results(&self) -> Vec<&ActionResult> {
        self.history.iter().flat_map(|step| step.result.iter()).collect()
    }

    pub fn extracted_content(&self) -> Vec<&str> {
        self.action_results()
            .into_iter()
            .filter_map(|r| r.extracted_content.as_deref())
            .collect()
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.history
            .last()
            .and_then(|step| step.model_output.as_ref())
            .and_then(|output| output.actions.last())
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.history
            .iter()
            .filter_map(|step| step.metadata.as_ref())
            .map(|meta| meta.duration_seconds())
            .sum()
    }
}
