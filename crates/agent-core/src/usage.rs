use parking_lot::Mutex;
use tracing::info;

use soulpilot_core_types::{TokenUsage, UsageSummary};

/// Thread-safe accumulator of oracle token usage for one run.
#[derive(Debug, Default)]
pub struct UsageTracker {
    summary: Mutex<UsageSummary>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, model: &str, usage: &TokenUsage) {
        self.summary.lock().record(model, usage);
    }

    pub fn summary(&self) -> UsageSummary {
        self.summary.lock().clone()
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        if summary.entry_count == 0 {
            return;
        }
        info!(
            prompt_tokens = summary.total_prompt_tokens,
            completion_tokens = summary.total_completion_tokens,
            calls = summary.entry_count,
            "💲 Total usage: {} tokens, ${:.4}",
            summary.total_tokens,
            summary.total_cost
        );
        for (model, usage) in &summary.by_model {
            info!(
                model = %model,
                invocations = usage.invocations,
                "  {} prompt + {} completion tokens",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
    }
}
