use std::sync::Arc;
use std::time::Duration;

use agent_core::agent_loop::prompt::EMPTY_ACTION_CLARIFICATION;
use agent_core::mock::ScriptedOracle;
use agent_core::{AgentError, DecisionClient, Message};
use serde_json::json;
use soulpilot_core_types::{Action, ActionCatalog, ActionSpec, DecisionSchema, SchemaOptions};

fn catalog() -> ActionCatalog {
    ActionCatalog::new()
        .with_action(ActionSpec::new(
            "click",
            "Click an element",
            json!({
                "type": "object",
                "properties": { "index": { "type": "integer" } },
                "required": ["index"],
            }),
        ))
        .expect("register click")
}

fn schema() -> DecisionSchema {
    catalog().decision_schema(&SchemaOptions::for_page("https://shop.test"))
}

fn client(oracle: Arc<ScriptedOracle>, max_actions: usize) -> DecisionClient {
    DecisionClient::new(oracle, Duration::from_secs(5), max_actions, 25)
}

#[tokio::test]
async fn empty_decision_is_retried_then_replaced_by_failed_done() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .reply(json!({ "action": [{}] }))
            .reply(json!({ "action": [] })),
    );
    let messages = vec![Message::system("sys"), Message::user("state")];

    let output = client(oracle.clone(), 5)
        .decide(&messages, &schema())
        .await
        .expect("decision");

    assert_eq!(output.actions, vec![Action::done(false, "No next action returned by LLM!")]);
    let calls = oracle.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].len(), messages.len() + 1);
    assert_eq!(calls[1].last().map(Message::text).as_deref(), Some(EMPTY_ACTION_CLARIFICATION));
}

#[tokio::test]
async fn retry_answer_is_used_when_not_empty() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .reply(json!({ "action": [] }))
            .reply(json!({ "action": [{ "click": { "index": 2 } }] })),
    );

    let output = client(oracle, 5)
        .decide(&[Message::user("state")], &schema())
        .await
        .expect("decision");

    assert_eq!(output.actions.len(), 1);
    assert_eq!(output.actions[0].index(), Some(2));
}

#[tokio::test]
async fn empty_entries_are_dropped_and_batch_truncated() {
    let oracle = Arc::new(ScriptedOracle::new().reply(json!({
        "action": [
            { "click": { "index": 1 } },
            {},
            { "click": { "index": 2 } },
            { "click": { "index": 3 } },
        ]
    })));

    let output = client(oracle, 2)
        .decide(&[Message::user("state")], &schema())
        .await
        .expect("decision");

    let indices: Vec<_> = output.actions.iter().map(|a| a.index()).collect();
    assert_eq!(indices, vec![Some(1), Some(2)]);
}

#[tokio::test]
async fn unknown_action_is_a_validation_error() {
    let oracle = Arc::new(ScriptedOracle::new().reply(json!({ "action": [{ "fly": {} }] })));

    let err = client(oracle, 5)
        .decide(&[Message::user("state")], &schema())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::OracleValidation(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_oracle_times_out() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .with_delay(Duration::from_millis(300))
            .reply(json!({ "action": [{ "done": { "success": true, "text": "late" } }] })),
    );
    let client = DecisionClient::new(oracle, Duration::from_millis(30), 5, 25);

    let err = client
        .decide(&[Message::user("state")], &schema())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::OracleTimeout { timeout_ms: 30 }));
}

#[tokio::test]
async fn usage_is_accumulated_per_model() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .with_model("test-model")
            .reply(json!({ "action": [{ "click": { "index": 1 } }] })),
    );
    let client = client(oracle, 5);

    client
        .decide(&[Message::user("state")], &schema())
        .await
        .expect("decision");

    let summary = client.usage().summary();
    assert_eq!(summary.total_prompt_tokens, 100);
    assert_eq!(summary.total_completion_tokens, 20);
    assert!(summary.by_model.contains_key("test-model"));
}
