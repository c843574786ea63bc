//! Observe-decide-act execution.
//!
//! ```text
//! for step in 0..max_steps:
//!     wait while paused; stop on failure budget or stop signal
//!     snapshot = env.observe()
//!     decision = oracle.decide(context + snapshot)   // bounded by llm timeout
//!     results  = execute_batch(decision.actions)      // re-checks the page per action
//!     history.append(record)
//!     if results.last().is_done: break
//! ```
//!
//! - [`TaskController`]: budgets, pause/stop, step timeout, final history
//! - [`StepExecutor`]: one step's phases and its record
//! - [`DecisionClient`]: one oracle exchange
//! - [`ActionSequenceExecutor`]: ordered batch execution with staleness checks

pub mod batch;
pub mod config;
pub mod controller;
pub mod decision;
pub mod prompt;
pub mod state;
pub mod step;

pub use batch::ActionSequenceExecutor;
pub use config::{AgentLoopConfig, ReplayOptions};
pub use controller::{
    extract_url_from_task, AgentLoopResult, AgentLoopStatus, DoneCallback, StepHook, StepHooks,
    TaskController, TaskControllerBuilder,
};
pub use decision::DecisionClient;
pub use prompt::{format_snapshot, DecisionContext};
pub use state::{RunState, StepInfo};
pub use step::{DecisionCallback, DownloadTracker, StepExecutor};
