//! Pause/resume/stop signalling shared between the loop and outside callers.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::AgentError;

#[derive(Debug)]
struct ControlInner {
    stop: CancellationToken,
    paused: watch::Sender<bool>,
}

/// Cloneable handle carrying the run's control signals.
///
/// Any clone may call [`pause`](Self::pause), [`resume`](Self::resume) or
/// [`stop`](Self::stop); the loop observes them at its checkpoints.
#[derive(Debug, Clone)]
pub struct RunControl {
    inner: Arc<ControlInner>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControlInner {
                stop: CancellationToken::new(),
                paused,
            }),
        }
    }

    pub fn pause(&self) {
        info!("🔄 pausing agent");
        self.inner.paused.send_replace(true);
    }

    pub fn resume(&self) {
        info!("▶️ resuming agent");
        self.inner.paused.send_replace(false);
    }

    /// Stop the run. Also releases a pending pause wait.
    pub fn stop(&self) {
        info!("⏹️ stopping agent");
        self.inner.stop.cancel();
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Block while paused; returns early once stopped.
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.inner.paused.subscribe();
        tokio::select! {
            _ = self.inner.stop.cancelled() => {}
            _ = rx.wait_for(|paused| !*paused) => {}
        }
    }

    /// Mid-step checkpoint: fails when stop or pause has been requested.
    pub fn check_interrupt(&self) -> Result<(), AgentError> {
        if self.is_stopped() {
            return Err(AgentError::interrupted("stopped"));
        }
        if self.is_paused() {
            return Err(AgentError::interrupted("paused"));
        }
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.stop.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resume_releases_waiter() {
        let control = RunControl::new();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_until_resumed().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        control.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn stop_releases_paused_waiter() {
        let control = RunControl::new();
        control.pause();
        control.stop();
        tokio::time::timeout(Duration::from_secs(1), control.wait_until_resumed())
            .await
            .unwrap();
        assert!(control.is_stopped());
    }

    #[test]
    fn check_interrupt_reports_cause() {
        let control = RunControl::new();
        assert!(control.check_interrupt().is_ok());
        control.pause();
        assert!(matches!(
            control.check_interrupt(),
            Err(AgentError::Interrupted(reason)) if reason == "paused"
        ));
    }
}
