use std::env;

use serial_test::serial;
use soulpilot::load_config;

const KEYS: [&str; 6] = [
    "SOULPILOT_MAX_FAILURES",
    "SOULPILOT_MAX_ACTIONS_PER_STEP",
    "SOULPILOT_LLM_TIMEOUT_MS",
    "SOULPILOT_STEP_TIMEOUT_MS",
    "SOULPILOT_LOG_LEVEL",
    "SOULPILOT_HISTORY_PATH",
];

fn clear_env() {
    for key in KEYS {
        env::remove_var(key);
    }
}

#[tokio::test]
#[serial]
async fn missing_file_falls_back_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let loaded = load_config(Some(path.as_path())).await.unwrap();

    assert_eq!(loaded.path, path);
    assert_eq!(loaded.config, soulpilot::PilotConfig::default());
}

#[tokio::test]
#[serial]
async fn env_overrides_file_values() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("soulpilot.yaml");
    std::fs::write(
        &path,
        "agent:\n  max_failures: 4\n  step_timeout_ms: 60000\nhistory_path: runs/a.json\n",
    )
    .unwrap();
    env::set_var("SOULPILOT_MAX_FAILURES", "7");
    env::set_var("SOULPILOT_LOG_LEVEL", "debug");

    let loaded = load_config(Some(path.as_path())).await.unwrap();
    clear_env();

    assert_eq!(loaded.config.agent.max_failures, 7);
    assert_eq!(loaded.config.agent.step_timeout_ms, 60_000);
    assert_eq!(loaded.config.logging.level, "debug");
    assert_eq!(
        loaded.config.history_path.as_deref(),
        Some(std::path::Path::new("runs/a.json"))
    );
}

#[tokio::test]
#[serial]
async fn invalid_override_is_reported() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    env::set_var("SOULPILOT_LLM_TIMEOUT_MS", "soon");

    let path = dir.path().join("none.yaml");
    let err = load_config(Some(path.as_path()))
        .await
        .err()
        .unwrap();
    clear_env();

    assert!(err.to_string().contains("SOULPILOT_LLM_TIMEOUT_MS"));
}

#[tokio::test]
#[serial]
async fn zero_actions_per_step_is_rejected() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("soulpilot.yaml");
    std::fs::write(&path, "agent:\n  max_actions_per_step: 0\n").unwrap();

    assert!(load_config(Some(path.as_path())).await.is_err());
}
