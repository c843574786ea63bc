//! SoulPilot agent core.
//!
//! Drives a task through bounded observe-decide-act steps against an
//! [`Environment`], asking an [`Oracle`] for each step's actions and
//! recording every step in an append-only history that
//! [`ReplayEngine`] can re-execute later.

pub mod agent_loop;
pub mod control;
pub mod environment;
pub mod errors;
pub mod events;
pub mod message;
pub mod mock;
pub mod oracle;
pub mod replay;
pub mod screenshots;
pub mod url_shortener;
pub mod usage;

pub use agent_loop::{
    extract_url_from_task, ActionSequenceExecutor, AgentLoopConfig, AgentLoopResult,
    AgentLoopStatus, DecisionCallback, DecisionClient, DecisionContext, DoneCallback,
    ReplayOptions, RunState, StepExecutor, StepHooks, StepInfo, TaskController,
    TaskControllerBuilder,
};
pub use control::RunControl;
pub use environment::{
    ActionContext, ActionInvoker, Environment, SharedEnvironment, SharedInvoker,
};
pub use errors::{format_error, AgentError};
pub use events::{AgentEvent, RunEvents};
pub use message::{ContentPart, Message, Role};
pub use oracle::{Oracle, OracleResponse};
pub use replay::{rebind, ReplayEngine};
pub use screenshots::{FsScreenshotStore, ScreenshotStore};
pub use url_shortener::{RestoreUrls, UrlReplacements, UrlShortener};
pub use usage::UsageTracker;
