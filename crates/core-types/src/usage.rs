use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Token counts reported by one oracle call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            cost: None,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,
    pub invocations: u64,
}

/// Accumulated usage over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub entry_count: u64,
    #[serde(default)]
    pub by_model: BTreeMap<String, ModelUsage>,
}

impl UsageSummary {
    pub fn record(&mut self, model: &str, usage: &TokenUsage) {
        let cost = usage.cost.unwrap_or(0.0);
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.total_cost += cost;
        self.entry_count += 1;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.cost += cost;
        entry.invocations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_per_model() {
        let mut summary = UsageSummary::default();
        summary.record("m1", &TokenUsage::new(100, 20));
        summary.record("m1", &TokenUsage::new(50, 5));
        summary.record(
            "m2",
            &TokenUsage {
                cost: Some(0.5),
                ..TokenUsage::new(10, 1)
            },
        );
        assert_eq!(summary.total_tokens, 186);
        assert_eq!(summary.entry_count, 3);
        assert_eq!(summary.by_model["m1"].invocations, 2);
        assert_eq!(summary.by_model["m2"].cost, 0.5);
    }
}
