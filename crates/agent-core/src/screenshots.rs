//! Persistence of per-step screenshots so history only stores paths.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::errors::AgentError;

#[async_trait]
pub trait ScreenshotStore: Send + Sync {
    /// Store a base64-encoded PNG for `step` and return its path.
    async fn store(&self, png_base64: &str, step: u32) -> Result<String, AgentError>;
}

/// Writes `step_<n>.png` files under one directory.
#[derive(Debug, Clone)]
pub struct FsScreenshotStore {
    dir: PathBuf,
}

impl FsScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ScreenshotStore for FsScreenshotStore {
    async fn store(&self, png_base64: &str, step: u32) -> Result<String, AgentError> {
        let bytes = STANDARD
            .decode(png_base64)
            .map_err(|err| AgentError::environment(format!("screenshot is not base64: {err}")))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| anyhow::Error::new(err).context("creating screenshot directory"))?;
        let path = self.dir.join(format!("step_{step}.png"));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| anyhow::Error::new(err).context(format!("writing {}", path.display())))?;
        debug!(step, path = %path.display(), "stored screenshot");
        Ok(path.to_string_lossy().into_owned())
    }
}
