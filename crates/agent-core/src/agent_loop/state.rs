//! Mutable progress of a run, owned by the loop.

use serde::{Deserialize, Serialize};

use soulpilot_core_types::{ActionResult, DecisionOutput, TaskId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub task_id: TaskId,
    /// Number of the next step to run.
    pub n_steps: u32,
    pub consecutive_failures: u32,
    #[serde(default)]
    pub last_result: Vec<ActionResult>,
    #[serde(default)]
    pub last_model_output: Option<DecisionOutput>,
    /// Set when the run continues an earlier task with new instructions.
    #[serde(default)]
    pub follow_up_task: bool,
    #[serde(default)]
    pub session_initialized: bool,
}

impl RunState {
    pub fn new(step_number_base: u32) -> Self {
        Self {
            n_steps: step_number_base,
            ..Default::default()
        }
    }

    /// Update the failure counter from a finished step's results.
    ///
    /// Exactly one erroring result counts as a failure, anything else resets.
    pub fn record_outcome(&mut self, results: &[ActionResult]) {
        if results.len() == 1 && results[0].has_error() {
            self.consecutive_failures += 1;
        } else if self.consecutive_failures > 0 {
            self.consecutive_failures = 0;
        }
    }
}

/// Position of a step inside the budget. `step_number` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInfo {
    pub step_number: u32,
    pub max_steps: u32,
}

impl StepInfo {
    pub fn new(step_number: u32, max_steps: u32) -> Self {
        Self {
            step_number,
            max_steps,
        }
    }

    pub fn is_last_step(&self) -> bool {
        self.step_number + 1 >= self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_error_increments_and_mixed_resets() {
        let mut state = RunState::new(1);
        state.record_outcome(&[ActionResult::error("boom")]);
        state.record_outcome(&[ActionResult::error("boom")]);
        assert_eq!(state.consecutive_failures, 2);

        state.record_outcome(&[ActionResult::error("boom"), ActionResult::extracted("ok")]);
        assert_eq!(state.consecutive_failures, 0);

        state.record_outcome(&[ActionResult::error("boom")]);
        state.record_outcome(&[ActionResult::extracted("ok")]);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn last_step_is_budget_minus_one() {
        assert!(!StepInfo::new(1, 3).is_last_step());
        assert!(StepInfo::new(2, 3).is_last_step());
        assert!(StepInfo::new(0, 1).is_last_step());
        assert!(StepInfo::new(0, 0).is_last_step());
    }
}
