//! Run lifecycle events published on the explicit event bus.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use soulpilot_core_types::TaskId;
use soulpilot_event_bus::{EventBus, InMemoryBus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    RunStarted {
        task_id: TaskId,
        task: String,
    },
    StepCompleted {
        task_id: TaskId,
        step: u32,
        actions: usize,
        errors: usize,
        url: String,
    },
    RunFinished {
        task_id: TaskId,
        steps: usize,
        is_done: bool,
        success: Option<bool>,
        error: Option<String>,
    },
}

/// Bus handle owned by one run. Closed when the run ends.
#[derive(Clone)]
pub struct RunEvents {
    bus: Arc<InMemoryBus<AgentEvent>>,
}

impl std::fmt::Debug for RunEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEvents")
            .field("bus", &self.bus.name())
            .field("open", &self.bus.is_open())
            .finish()
    }
}

impl Default for RunEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

impl RunEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            bus: InMemoryBus::named("agent-run", capacity),
        }
    }

    pub fn from_bus(bus: Arc<InMemoryBus<AgentEvent>>) -> Self {
        Self { bus }
    }

    /// Publish, ignoring a bus that has already been closed.
    pub async fn publish(&self, event: AgentEvent) {
        if let Err(err) = self.bus.publish(event).await {
            debug!(error = %err, "run event dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.bus.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.bus.is_open()
    }

    pub fn close(&self) {
        self.bus.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_until_close() {
        let events = RunEvents::new(8);
        let mut rx = events.subscribe();
        let task_id = TaskId("t-1".into());
        events
            .publish(AgentEvent::RunStarted {
                task_id: task_id.clone(),
                task: "find shoes".into(),
            })
            .await;
        events.close();
        events
            .publish(AgentEvent::RunFinished {
                task_id,
                steps: 0,
                is_done: false,
                success: None,
                error: None,
            })
            .await;

        assert!(matches!(rx.recv().await, Ok(AgentEvent::RunStarted { .. })));
        assert!(rx.recv().await.is_err());
        assert!(!events.is_open());
    }
}
