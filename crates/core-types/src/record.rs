use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::DecisionOutput;
use crate::environment::{EnvironmentSnapshot, EnvironmentStateHistory, InteractedElement};
use crate::result::ActionResult;

/// Timing of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetadata {
    pub step_number: u32,
    pub step_start_time: DateTime<Utc>,
    pub step_end_time: DateTime<Utc>,
}

impl StepMetadata {
    pub fn new(step_number: u32, started: DateTime<Utc>, finished: DateTime<Utc>) -> Self {
        Self {
            step_number,
            step_start_time: started,
            step_end_time: finished,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.step_end_time - self.step_start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Persisted account of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub model_output: Option<DecisionOutput>,
    #[serde(default)]
    pub result: Vec<ActionResult>,
    pub state: EnvironmentStateHistory,
    #[serde(default)]
    pub metadata: Option<StepMetadata>,
}

impl StepRecord {
    pub fn new(
        model_output: Option<DecisionOutput>,
        result: Vec<ActionResult>,
        state: EnvironmentStateHistory,
        metadata: Option<StepMetadata>,
    ) -> Self {
        Self {
            model_output,
            result,
            state,
            metadata,
        }
    }

    /// The elements each requested action targeted in `snapshot`.
    pub fn interacted_elements(
        output: Option<&DecisionOutput>,
        snapshot: &EnvironmentSnapshot,
    ) -> Vec<Option<InteractedElement>> {
        let Some(output) = output else {
            return vec![None];
        };
        output
            .actions
            .iter()
            .map(|action| {
                action
                    .index()
                    .and_then(|index| snapshot.element(index))
                    .map(InteractedElement::from_descriptor)
            })
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.result.last().map(|r| r.is_done).unwrap_or(false)
    }

    pub fn first_error(&self) -> Option<&str> {
        self.result.iter().find_map(|r| r.error.as_deref())
    }
}
