//! Decision context for the oracle.
//!
//! [`DecisionContext`] keeps the task, the running step notes and one-time
//! extracted content, and renders them together with the latest environment
//! snapshot into the message list sent to the oracle each step.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Local;
use serde_json::Value;
use tracing::debug;

use soulpilot_core_types::{ActionCatalog, ActionResult, DecisionOutput, EnvironmentSnapshot};

use super::state::StepInfo;
use crate::errors::AgentError;
use crate::message::Message;

/// Directive added on the last available step.
pub const LAST_STEP_DIRECTIVE: &str = "Now comes your last step. Use only the \"done\" action now. No other actions - so here your action sequence must have length 1.\nIf the task is not yet fully finished as requested by the user, set success in \"done\" to false! E.g. if not all steps are fully completed.\nIf the task is fully finished, set success in \"done\" to true.\nInclude everything you found out for the ultimate task in the done text.";

/// Clarification sent when the oracle returned no action.
pub const EMPTY_ACTION_CLARIFICATION: &str = "You forgot to return an action. Please respond with a valid JSON action according to the expected schema with your assessment and next actions.";

/// Directive added once the failure budget is spent.
pub fn failure_directive(max_failures: u32) -> String {
    format!(
        "You have failed {max_failures} consecutive times. This is your final step to complete the task or provide what you found. Use only the \"done\" action now. No other actions - so here your action sequence must have length 1.\nIf the task could not be completed due to the failures, set success in \"done\" to false!\nInclude everything you found out for the task in the done text."
    )
}

const SYSTEM_PROMPT: &str = r#"You are an automation agent working through an observe-decide-act loop.

Each step you receive:
1. <agent_history>: what you did in earlier steps and how it went
2. <agent_state>: the user request, step budget and available files
3. <environment_state>: current URL, title, open tabs and the indexed interactive elements
4. A screenshot, when vision is enabled

Interactive elements are listed as `[index]<tag attributes>text</tag>`. Only elements with an [index] can be targeted, and indices change whenever the page updates.

Respond with valid JSON matching the requested schema. Fill `memory` with the facts you need later. Put at most {max_actions} actions in `action`; they run in order and the sequence stops early when the page changes.

Call `done` when the task is finished or cannot be finished. `done` must be the only action of its step. Set `success` to false unless the whole request was completed.

Available actions:
{actions}"#;

/// Accumulated conversation state for one run.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    system_prompt: String,
    task: String,
    follow_ups: Vec<String>,
    history_items: Vec<String>,
    /// Notes kept at most; the oldest after the first are dropped.
    max_history_items: Option<usize>,
    omitted_items: usize,
    read_state: Vec<String>,
}

impl DecisionContext {
    pub fn new(task: impl Into<String>, catalog: &ActionCatalog, max_actions: u32) -> Self {
        let system_prompt = SYSTEM_PROMPT
            .replace("{max_actions}", &max_actions.to_string())
            .replace("{actions}", &catalog.prompt_description(None));
        Self {
            system_prompt,
            task: task.into(),
            follow_ups: Vec::new(),
            history_items: vec!["<sys>\nAgent initialized\n</sys>".to_string()],
            max_history_items: None,
            omitted_items: 0,
            read_state: Vec::new(),
        }
    }

    pub fn with_max_history_items(mut self, limit: Option<usize>) -> Self {
        self.max_history_items = limit;
        self.trim_history();
        self
    }

    fn push_history_item(&mut self, item: String) {
        self.history_items.push(item);
        self.trim_history();
    }

    /// Keep the first note and the most recent ones within the limit.
    fn trim_history(&mut self) {
        let Some(limit) = self.max_history_items else {
            return;
        };
        let limit = limit.max(2);
        if self.history_items.len() > limit {
            let excess = self.history_items.len() - limit;
            self.history_items.drain(1..=excess);
            self.omitted_items += excess;
        }
    }

    fn rendered_history(&self) -> String {
        if self.omitted_items == 0 {
            return self.history_items.join("\n");
        }
        let mut items = Vec::with_capacity(self.history_items.len() + 1);
        items.extend(self.history_items.first().cloned());
        items.push(format!(
            "<sys>[... {} previous steps omitted...]</sys>",
            self.omitted_items
        ));
        items.extend(self.history_items.iter().skip(1).cloned());
        items.join("\n")
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Append follow-up instructions to the running task.
    pub fn add_new_task(&mut self, task: impl Into<String>) {
        let task = task.into();
        self.push_history_item(format!(
            "<user_request>\nNew follow-up task added: {task}\n</user_request>"
        ));
        self.follow_ups.push(task);
    }

    /// Fold a finished step into the history notes.
    pub fn record_step(
        &mut self,
        step: u32,
        output: Option<&DecisionOutput>,
        results: &[ActionResult],
    ) {
        self.read_state.clear();

        let mut item = format!("<step_{step}>\n");
        if let Some(output) = output {
            if let Some(eval) = output.evaluation_previous_goal.as_deref() {
                let _ = writeln!(item, "Evaluation of Previous Step: {eval}");
            }
            if let Some(memory) = output.memory.as_deref() {
                let _ = writeln!(item, "Memory: {memory}");
            }
            if let Some(goal) = output.next_goal.as_deref() {
                let _ = writeln!(item, "Next Goal: {goal}");
            }
        }

        if !results.is_empty() {
            item.push_str("Action Results:\n");
        }
        for (i, result) in results.iter().enumerate() {
            let position = format!("Action {}/{}", i + 1, results.len());
            if let Some(memory) = result.long_term_memory.as_deref() {
                let _ = writeln!(item, "{position}: {memory}");
            } else if let Some(content) = result.extracted_content.as_deref() {
                if !result.include_extracted_content_only_once {
                    let _ = writeln!(item, "{position}: {content}");
                }
            }
            if let Some(error) = result.error.as_deref() {
                let _ = writeln!(item, "{position}: {}", truncate_error(error));
            }
            if result.include_extracted_content_only_once {
                if let Some(content) = result.extracted_content.as_deref() {
                    self.read_state.push(content.to_string());
                }
            }
        }
        let _ = write!(item, "</step_{step}>");
        self.push_history_item(item);
    }

    /// Notes currently kept, not counting omitted ones.
    pub fn history_len(&self) -> usize {
        self.history_items.len()
    }

    fn agent_state(&self, step: StepInfo, available_files: &[String]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<user_request>\n{}", self.task);
        for follow_up in &self.follow_ups {
            let _ = writeln!(out, "{follow_up}");
        }
        out.push_str("</user_request>\n");
        let _ = writeln!(
            out,
            "<step_info>\nStep {} of {} max possible steps\nCurrent date and time: {}\n</step_info>",
            step.step_number + 1,
            step.max_steps,
            Local::now().format("%Y-%m-%d %H:%M")
        );
        if !available_files.is_empty() {
            let _ = writeln!(
                out,
                "<available_file_paths>\n{}\n</available_file_paths>",
                available_files.join("\n")
            );
        }
        out
    }

    /// Build the messages for one oracle call.
    ///
    /// `directives` are appended as separate user messages after the state.
    pub fn messages(
        &self,
        snapshot: &EnvironmentSnapshot,
        step: StepInfo,
        available_files: &[String],
        page_actions: Option<&str>,
        use_vision: bool,
        directives: &[String],
    ) -> Vec<Message> {
        let mut state = String::new();
        let _ = writeln!(
            state,
            "<agent_history>\n{}\n</agent_history>",
            self.rendered_history()
        );
        let _ = writeln!(
            state,
            "<agent_state>\n{}</agent_state>",
            self.agent_state(step, available_files)
        );
        let _ = writeln!(
            state,
            "<environment_state>\n{}</environment_state>",
            format_snapshot(snapshot)
        );
        if !self.read_state.is_empty() {
            let _ = writeln!(state, "<read_state>\n{}\n</read_state>", self.read_state.join("\n"));
        }
        if let Some(actions) = page_actions.filter(|a| !a.is_empty()) {
            let _ = writeln!(state, "<page_specific_actions>\n{actions}\n</page_specific_actions>");
        }

        let state_message = match snapshot.screenshot.as_deref() {
            Some(screenshot) if use_vision => Message::user_with_image(state, screenshot),
            _ => Message::user(state),
        };

        let mut messages = vec![Message::system(self.system_prompt.clone()), state_message];
        messages.extend(directives.iter().map(|d| Message::user(d.clone())));
        messages
    }
}

fn truncate_error(error: &str) -> String {
    const LIMIT: usize = 400;
    if error.chars().count() <= LIMIT {
        return error.to_string();
    }
    let head: String = error.chars().take(LIMIT / 2).collect();
    let tail: String = error
        .chars()
        .rev()
        .take(LIMIT / 2)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}......{tail}")
}

/// Render URL, tabs and indexed elements.
pub fn format_snapshot(snapshot: &EnvironmentSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Current URL: {}", snapshot.url);
    let _ = writeln!(out, "Title: {}", snapshot.title);
    if !snapshot.tabs.is_empty() {
        out.push_str("Available tabs:\n");
        for tab in &snapshot.tabs {
            let title: String = tab.title.chars().take(30).collect();
            let _ = writeln!(out, "Tab {}: {} - {}", tab.tab_id, tab.url, title);
        }
    }
    if snapshot.elements.is_empty() {
        out.push_str("Interactive elements: none\n");
        return out;
    }
    out.push_str("Interactive elements:\n");
    for (index, element) in &snapshot.elements {
        let attrs: String = element
            .attributes
            .iter()
            .map(|(k, v)| format!(" {k}=\"{v}\""))
            .collect();
        let _ = writeln!(
            out,
            "[{index}]<{tag}{attrs}>{text}</{tag}>",
            tag = element.tag_name,
            text = element.text.as_deref().unwrap_or_default()
        );
    }
    out
}

/// Write one step's input messages and the decision to `path`.
pub async fn save_conversation(
    messages: &[Message],
    output: &DecisionOutput,
    path: &Path,
) -> Result<(), AgentError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| anyhow::Error::new(err).context("creating conversation directory"))?;
    }

    let mut text = String::new();
    for message in messages {
        let role = serde_json::to_value(message.role)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let _ = writeln!(text, " {role} \n{}\n", message.text());
    }
    let decision = serde_json::to_string_pretty(output).unwrap_or_else(|_| Value::Null.to_string());
    let _ = writeln!(text, " RESPONSE\n{decision}");

    tokio::fs::write(path, text)
        .await
        .map_err(|err| anyhow::Error::new(err).context(format!("writing {}", path.display())))?;
    debug!(path = %path.display(), "saved conversation");
    Ok(())
}
