//! Collaborator contracts for the live environment.

use std::sync::Arc;

use async_trait::async_trait;

use soulpilot_core_types::{Action, ActionResult, EnvironmentSnapshot, ObserveOptions, TaskId};

use crate::errors::AgentError;

/// Read side of the automated surface.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Capture the current state. Must be cheap when heavy fields are off.
    async fn observe(&self, options: ObserveOptions) -> Result<EnvironmentSnapshot, AgentError>;

    /// Paths of every file downloaded so far.
    async fn downloaded_files(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Per-call information handed to the action invoker.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    pub task_id: TaskId,
    pub step: u32,
    pub available_file_paths: Vec<String>,
}

impl ActionContext {
    pub fn new(task_id: TaskId, step: u32) -> Self {
        Self {
            task_id,
            step,
            available_file_paths: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.available_file_paths = files;
        self
    }
}

/// Write side: performs one action against the environment.
///
/// Returning `Err` means the environment is unusable; it aborts the batch.
/// Recoverable failures belong in [`ActionResult::error`].
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    async fn execute(
        &self,
        action: &Action,
        env: &dyn Environment,
        ctx: &ActionContext,
    ) -> Result<ActionResult, AgentError>;
}

pub type SharedEnvironment = Arc<dyn Environment>;
pub type SharedInvoker = Arc<dyn ActionInvoker>;
