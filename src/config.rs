//! File and environment configuration for a SoulPilot run.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use agent_core::{AgentLoopConfig, ReplayOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub agent: AgentLoopConfig,
    pub replay: ReplayOptions,
    pub logging: LoggingConfig,
    /// Where `save_history` writes when no path is given.
    pub history_path: Option<PathBuf>,
    pub screenshots_dir: Option<PathBuf>,
}

impl PilotConfig {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Failed to parse config file")
    }

    /// Apply `SOULPILOT_*` environment variables on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u32>("SOULPILOT_MAX_FAILURES")? {
            self.agent.max_failures = v;
        }
        if let Some(v) = env_parse::<u32>("SOULPILOT_MAX_ACTIONS_PER_STEP")? {
            self.agent.max_actions_per_step = v;
        }
        if let Some(v) = env_parse::<u64>("SOULPILOT_LLM_TIMEOUT_MS")? {
            self.agent.llm_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("SOULPILOT_STEP_TIMEOUT_MS")? {
            self.agent.step_timeout_ms = v;
        }
        if let Ok(level) = env::var("SOULPILOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(path) = env::var("SOULPILOT_HISTORY_PATH") {
            self.history_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.agent.validate().context("Invalid agent configuration")?;
        self.logging
            .level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow::anyhow!("Invalid log level '{}'", self.logging.level))?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: '{raw}'")),
        Err(_) => Ok(None),
    }
}

/// Default lookup: `./config/soulpilot.yaml`, then the user config dir.
pub fn default_config_path() -> Result<PathBuf> {
    let local_config = PathBuf::from("config/soulpilot.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("soulpilot");
    path.push("config.yaml");
    Ok(path)
}

pub struct LoadedConfig {
    pub config: PilotConfig,
    pub path: PathBuf,
}

pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let config = PilotConfig::from_yaml(&content)?;
        info!("Loaded configuration from: {}", config_path.display());
        config
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        PilotConfig::default()
    };

    config.apply_env_overrides()?;
    config.validate()?;
    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = PilotConfig::from_yaml(
            "agent:\n  max_failures: 5\n  use_vision: false\nlogging:\n  json: true\n",
        )
        .unwrap();
        assert_eq!(config.agent.max_failures, 5);
        assert!(!config.agent.use_vision);
        assert_eq!(config.agent.max_actions_per_step, 10);
        assert_eq!(config.replay.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn bad_level_fails_validation() {
        let mut config = PilotConfig::default();
        config.logging.level = "chatty".into();
        assert!(config.validate().is_err());
    }
}
