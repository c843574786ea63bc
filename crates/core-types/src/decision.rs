use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Structured output of one oracle call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutput {
    /// Free-form reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    /// Assessment of whether the previous goal was met.
    #[serde(default)]
    pub evaluation_previous_goal: Option<String>,

    /// Facts carried to later steps.
    #[serde(default)]
    pub memory: Option<String>,

    /// Immediate objective for this step.
    #[serde(default)]
    pub next_goal: Option<String>,

    /// Ordered actions to execute.
    #[serde(rename = "action", default)]
    pub actions: Vec<Action>,
}

impl DecisionOutput {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }

    pub fn with_next_goal(mut self, goal: impl Into<String>) -> Self {
        self.next_goal = Some(goal.into());
        self
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    pub fn with_evaluation(mut self, evaluation: impl Into<String>) -> Self {
        self.evaluation_previous_goal = Some(evaluation.into());
        self
    }

    /// True when the list is empty or holds only empty actions.
    pub fn has_no_actions(&self) -> bool {
        self.actions.iter().all(Action::is_empty)
    }

    /// Drop empty actions when real ones are present alongside them.
    pub fn drop_empty_actions(&mut self) {
        if !self.has_no_actions() {
            self.actions.retain(|action| !action.is_empty());
        }
    }

    pub fn truncate_actions(&mut self, max: usize) -> usize {
        let dropped = self.actions.len().saturating_sub(max);
        self.actions.truncate(max);
        dropped
    }

    pub fn is_done(&self) -> bool {
        self.actions.iter().any(Action::is_done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_actions_are_dropped_only_when_mixed() {
        let mut only_empty = DecisionOutput::new(vec![Action::empty(), Action::empty()]);
        only_empty.drop_empty_actions();
        assert_eq!(only_empty.actions.len(), 2);
        assert!(only_empty.has_no_actions());

        let mut mixed = DecisionOutput::new(vec![Action::empty(), Action::done(true, "ok")]);
        mixed.drop_empty_actions();
        assert_eq!(mixed.actions, vec![Action::done(true, "ok")]);
    }

    #[test]
    fn serializes_actions_under_action_key() {
        let output = DecisionOutput::new(vec![Action::done(true, "x")]).with_next_goal("finish");
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["action"], json!([{"done": {"success": true, "text": "x"}}]));
        assert!(value.get("thinking").is_none());
        let back: DecisionOutput = serde_json::from_value(value).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn truncation_reports_dropped_count() {
        let mut output = DecisionOutput::new(vec![Action::empty(); 5]);
        assert_eq!(output.truncate_actions(3), 2);
        assert_eq!(output.actions.len(), 3);
        assert_eq!(output.truncate_actions(10), 0);
    }
}
