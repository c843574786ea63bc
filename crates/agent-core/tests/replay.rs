use std::sync::Arc;

use agent_core::mock::{RecordingInvoker, ScriptedEnvironment};
use agent_core::{AgentError, ReplayEngine, ReplayOptions};
use chrono::Utc;
use serde_json::json;
use soulpilot_core_types::{
    Action, ActionCatalog, ActionResult, ActionSpec, DecisionOutput, ElementDescriptor,
    EnvironmentSnapshot, EnvironmentStateHistory, StepMetadata, StepRecord,
};
use soulpilot_history_store::{History, HistoryStore, SerializeOptions};

fn catalog() -> Arc<ActionCatalog> {
    let catalog = ActionCatalog::new()
        .with_action(ActionSpec::new(
            "click",
            "Click an element",
            json!({
                "type": "object",
                "properties": { "index": { "type": "integer" } },
                "required": ["index"],
            }),
        ))
        .expect("register click");
    Arc::new(catalog)
}

fn buy_button() -> ElementDescriptor {
    ElementDescriptor::new("button", "html/body/form/button")
        .with_ancestors(["html", "body", "form"])
        .with_attribute("id", "buy")
}

fn banner() -> ElementDescriptor {
    ElementDescriptor::new("a", "html/body/a").with_ancestors(["html", "body"])
}

/// Two recorded steps: a click on the buy button at index 2, then done.
fn recorded_history() -> History {
    let recorded_page = EnvironmentSnapshot::new("https://shop.test", "Shop")
        .with_element(1, banner())
        .with_element(2, buy_button());

    let mut history = History::new();
    for (step, action) in [
        Action::from_value("click", json!({ "index": 2 })).unwrap(),
        Action::done(true, "bought"),
    ]
    .into_iter()
    .enumerate()
    {
        let output = DecisionOutput::new(vec![action]).with_next_goal("buy");
        let state = EnvironmentStateHistory::from_snapshot(
            &recorded_page,
            StepRecord::interacted_elements(Some(&output), &recorded_page),
            None,
        );
        let now = Utc::now();
        history.push(StepRecord::new(
            Some(output),
            vec![ActionResult::extracted("ok")],
            state,
            Some(StepMetadata::new(step as u32 + 1, now, now)),
        ));
    }
    history
}

fn options() -> ReplayOptions {
    ReplayOptions {
        delay_between_actions_ms: 0,
        ..ReplayOptions::default()
    }
}

#[tokio::test]
async fn rebinds_shifted_element_and_replays() {
    let shifted = EnvironmentSnapshot::new("https://shop.test", "Shop")
        .with_element(1, banner())
        .with_element(2, ElementDescriptor::new("div", "html/body/div"))
        .with_element(5, buy_button());
    let env = Arc::new(ScriptedEnvironment::new(shifted));
    let invoker = Arc::new(RecordingInvoker::new());
    let engine = ReplayEngine::new(env, invoker.clone(), catalog());

    let results = engine
        .replay(&recorded_history(), &options())
        .await
        .expect("replay");

    let executed = invoker.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0].index(), Some(5));
    assert!(executed[1].is_done());
    assert_eq!(results.len(), 2);
    assert!(results[1].is_done);
}

#[tokio::test]
async fn missing_element_fails_without_retry() {
    let changed = EnvironmentSnapshot::new("https://shop.test", "Shop")
        .with_element(1, banner())
        .with_element(2, ElementDescriptor::new("div", "html/body/div"));
    let env = Arc::new(ScriptedEnvironment::new(changed));
    let invoker = Arc::new(RecordingInvoker::new());
    let engine = ReplayEngine::new(env.clone(), invoker.clone(), catalog());

    let err = engine
        .replay(&recorded_history(), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ElementNotFound { position: 0 }));
    assert_eq!(env.observation_count(), 1);
    assert!(invoker.executed().is_empty());
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let page = EnvironmentSnapshot::new("https://shop.test", "Shop")
        .with_element(1, banner())
        .with_element(2, buy_button());
    let env = Arc::new(ScriptedEnvironment::new(page));
    let invoker = Arc::new(RecordingInvoker::new().fail("connection reset"));
    let engine = ReplayEngine::new(env, invoker.clone(), catalog());

    let results = engine
        .replay(&recorded_history(), &options())
        .await
        .expect("replay");

    assert_eq!(invoker.executed_names(), vec!["click", "click", "done"]);
    assert!(results.iter().all(|r| !r.has_error()));
}

#[tokio::test]
async fn exhausted_retries_abort_unless_skippable() {
    let page = EnvironmentSnapshot::new("https://shop.test", "Shop").with_element(2, buy_button());

    let strict = ReplayOptions {
        max_retries: 2,
        skip_failures: false,
        delay_between_actions_ms: 0,
    };
    let invoker = Arc::new(RecordingInvoker::new().fail("down").fail("down"));
    let engine = ReplayEngine::new(
        Arc::new(ScriptedEnvironment::new(page.clone())),
        invoker,
        catalog(),
    );
    let err = engine.replay(&recorded_history(), &strict).await.unwrap_err();
    assert!(err.to_string().contains("Step 1 failed after 2 attempts"), "{err}");

    let lenient = ReplayOptions {
        skip_failures: true,
        ..strict
    };
    let invoker = Arc::new(RecordingInvoker::new().fail("down").fail("down"));
    let engine = ReplayEngine::new(Arc::new(ScriptedEnvironment::new(page)), invoker, catalog());
    let results = engine.replay(&recorded_history(), &lenient).await.expect("replay");
    assert_eq!(results.len(), 2);
    assert!(results[0].has_error());
    assert!(results[1].is_done);
}

#[tokio::test]
async fn steps_without_decision_are_skipped() {
    let mut history = History::new();
    history.push(StepRecord::new(
        None,
        vec![ActionResult::error("boom")],
        EnvironmentStateHistory::default(),
        None,
    ));
    let invoker = Arc::new(RecordingInvoker::new());
    let engine = ReplayEngine::new(
        Arc::new(ScriptedEnvironment::new(EnvironmentSnapshot::default())),
        invoker.clone(),
        catalog(),
    );

    let results = engine.replay(&history, &options()).await.expect("replay");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].error.as_deref(), Some("No action to replay"));
    assert!(invoker.executed().is_empty());
}

#[tokio::test]
async fn replays_history_loaded_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("run.json");
    HistoryStore::from_history(recorded_history())
        .save_to_file(&path, SerializeOptions::default())
        .await
        .expect("save");

    let page = EnvironmentSnapshot::new("https://shop.test", "Shop").with_element(9, buy_button());
    let invoker = Arc::new(RecordingInvoker::new());
    let engine = ReplayEngine::new(Arc::new(ScriptedEnvironment::new(page)), invoker.clone(), catalog());

    engine.load_and_replay(&path, &options()).await.expect("replay");

    assert_eq!(invoker.executed()[0].index(), Some(9));
}
