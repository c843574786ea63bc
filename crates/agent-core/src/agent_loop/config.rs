//! Configuration for the observe-decide-act loop and for replay.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Configuration for one task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Consecutive failing steps tolerated before the run gives up.
    /// Default: 3
    pub max_failures: u32,

    /// Grant one extra, terminal-only step once the failure budget is spent.
    /// Default: true
    pub final_response_after_failure: bool,

    /// Actions kept from one decision; extra actions are dropped.
    /// Default: 10
    pub max_actions_per_step: u32,

    /// Timeout for one oracle round-trip (including the empty-decision retry).
    /// Default: 90000 (90 seconds)
    pub llm_timeout_ms: u64,

    /// Timeout for a whole step. Independent of `llm_timeout_ms`.
    /// Default: 120000 (2 minutes)
    pub step_timeout_ms: u64,

    /// Settle time before each action after the first in a batch.
    /// Default: 500
    pub wait_between_actions_ms: u64,

    /// Longest query/fragment kept verbatim when shortening URLs.
    /// Default: 25
    pub url_shortening_limit: usize,

    /// Ask the oracle for a free-form `thinking` field.
    /// Default: true
    pub use_thinking: bool,

    /// Reduce decisions to memory and actions.
    /// Default: false
    pub flash_mode: bool,

    /// Capture screenshots and show them to the oracle.
    /// Default: true
    pub use_vision: bool,

    /// Record the full error chain in failing results.
    /// Default: false
    pub verbose_errors: bool,

    /// Navigate straight to a single URL found in the task text.
    /// Default: true
    pub directly_open_url: bool,

    /// Catalog name of the navigation action used for the initial URL.
    /// Default: "navigate"
    pub navigate_action: String,

    /// Step notes shown to the oracle; older ones after the first are
    /// elided. `None` keeps everything.
    /// Default: 40
    pub max_history_items: Option<usize>,

    /// Number of the first step.
    /// Default: 1
    pub step_number_base: u32,

    /// Write each step's conversation into this directory.
    pub save_conversation_dir: Option<PathBuf>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            final_response_after_failure: true,
            max_actions_per_step: 10,
            llm_timeout_ms: 90_000,
            step_timeout_ms: 120_000,
            wait_between_actions_ms: 500,
            url_shortening_limit: 25,
            use_thinking: true,
            flash_mode: false,
            use_vision: true,
            verbose_errors: false,
            directly_open_url: true,
            navigate_action: "navigate".to_string(),
            max_history_items: Some(40),
            step_number_base: 1,
            save_conversation_dir: None,
        }
    }
}

impl AgentLoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small, quick config for tests.
    pub fn minimal() -> Self {
        Self {
            max_failures: 2,
            max_actions_per_step: 3,
            llm_timeout_ms: 5_000,
            step_timeout_ms: 10_000,
            wait_between_actions_ms: 0,
            use_vision: false,
            directly_open_url: false,
            ..Self::default()
        }
    }

    /// Config tuned for fast execution.
    pub fn fast() -> Self {
        Self {
            max_actions_per_step: 5,
            llm_timeout_ms: 30_000,
            step_timeout_ms: 60_000,
            wait_between_actions_ms: 100,
            use_thinking: false,
            flash_mode: true,
            use_vision: false,
            ..Self::default()
        }
    }

    /// Builder: limit the step notes shown to the oracle.
    pub fn history_items(mut self, limit: Option<usize>) -> Self {
        self.max_history_items = limit;
        self
    }

    /// Builder: set the consecutive failure budget.
    pub fn max_failures(mut self, failures: u32) -> Self {
        self.max_failures = failures;
        self
    }

    pub fn final_response_after_failure(mut self, enabled: bool) -> Self {
        self.final_response_after_failure = enabled;
        self
    }

    pub fn actions_per_step(mut self, count: u32) -> Self {
        self.max_actions_per_step = count;
        self
    }

    pub fn llm_timeout(mut self, ms: u64) -> Self {
        self.llm_timeout_ms = ms;
        self
    }

    pub fn step_timeout(mut self, ms: u64) -> Self {
        self.step_timeout_ms = ms;
        self
    }

    pub fn wait_between_actions(mut self, ms: u64) -> Self {
        self.wait_between_actions_ms = ms;
        self
    }

    pub fn vision(mut self, enabled: bool) -> Self {
        self.use_vision = enabled;
        self
    }

    pub fn thinking(mut self, enabled: bool) -> Self {
        self.use_thinking = enabled;
        self
    }

    pub fn flash(mut self, enabled: bool) -> Self {
        self.flash_mode = enabled;
        self
    }

    pub fn verbose_errors(mut self, enabled: bool) -> Self {
        self.verbose_errors = enabled;
        self
    }

    pub fn directly_open_url(mut self, enabled: bool) -> Self {
        self.directly_open_url = enabled;
        self
    }

    pub fn save_conversation_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_conversation_dir = Some(dir.into());
        self
    }

    /// Failures after which the loop stops: one more than `max_failures`
    /// when a final response is granted.
    pub fn failure_limit(&self) -> u32 {
        self.max_failures
            .saturating_add(u32::from(self.final_response_after_failure))
    }

    pub fn llm_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn step_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn wait_between_actions_duration(&self) -> Duration {
        Duration::from_millis(self.wait_between_actions_ms)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_actions_per_step == 0 {
            return Err(AgentError::config("max_actions_per_step must be at least 1"));
        }
        if self.llm_timeout_ms == 0 {
            return Err(AgentError::config("llm_timeout_ms must be positive"));
        }
        if self.step_timeout_ms == 0 {
            return Err(AgentError::config("step_timeout_ms must be positive"));
        }
        if matches!(self.max_history_items, Some(limit) if limit <= 5) {
            return Err(AgentError::config("max_history_items must be greater than 5"));
        }
        if self.directly_open_url && self.navigate_action.trim().is_empty() {
            return Err(AgentError::config(
                "navigate_action is required when directly_open_url is enabled",
            ));
        }
        Ok(())
    }
}

/// Knobs for [`ReplayEngine`](crate::replay::ReplayEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// Attempts per step.
    /// Default: 3
    pub max_retries: u32,

    /// Record a failing step and move on instead of aborting.
    /// Default: true
    pub skip_failures: bool,

    /// Pause after each replayed step and between retries.
    /// Default: 2000
    pub delay_between_actions_ms: u64,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            skip_failures: true,
            delay_between_actions_ms: 2_000,
        }
    }
}

impl ReplayOptions {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_between_actions_ms)
    }
}
