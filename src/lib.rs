//! SoulPilot - observe-decide-act task driver.
//!
//! Re-exports the workspace crates and adds the process-level pieces:
//! configuration loading and tracing setup.

pub mod config;
pub mod logging;

pub use agent_core::*;
pub use soulpilot_core_types as types;
pub use soulpilot_event_bus as event_bus;
pub use soulpilot_history_store as history;

pub use config::{default_config_path, load_config, LoadedConfig, LoggingConfig, PilotConfig};
pub use logging::init_logging;
