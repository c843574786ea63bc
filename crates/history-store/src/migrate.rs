//! Upgrades history documents written by older releases.
//!
//! Older documents name tabs by a numeric `page_id`, store interacted
//! elements without node metadata, and may carry `model_output` values that
//! are not objects. Everything here operates on the raw JSON before typed
//! decoding.

use serde_json::{Map, Value};
use tracing::debug;

use soulpilot_core_types::ElementIdentity;

const ELEMENT_FIELDS: [&str; 9] = [
    "node_id",
    "backend_node_id",
    "frame_id",
    "node_type",
    "node_value",
    "node_name",
    "bounds",
    "x_path",
    "element_hash",
];

/// Rewrite a history document in place. Returns the number of steps touched.
pub fn migrate_document(document: &mut Value) -> usize {
    let Some(steps) = document.get_mut("history").and_then(Value::as_array_mut) else {
        return 0;
    };

    let mut touched = 0;
    for step in steps.iter_mut().filter_map(Value::as_object_mut) {
        if migrate_step(step) {
            touched += 1;
        }
    }
    if touched > 0 {
        debug!(steps = touched, "migrated legacy history steps");
    }
    touched
}

fn migrate_step(step: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    match step.get("model_output") {
        Some(Value::Object(_)) | Some(Value::Null) => {}
        Some(_) => {
            step.insert("model_output".into(), Value::Null);
            changed = true;
        }
        None => {
            step.insert("model_output".into(), Value::Null);
        }
    }

    let Some(state) = step.get_mut("state").and_then(Value::as_object_mut) else {
        return changed;
    };

    if let Some(tabs) = state.get_mut("tabs").and_then(Value::as_array_mut) {
        for tab in tabs.iter_mut().filter_map(Value::as_object_mut) {
            changed |= migrate_tab(tab);
        }
    }

    match state.get_mut("interacted_element") {
        None => {
            state.insert("interacted_element".into(), Value::Null);
            changed = true;
        }
        Some(Value::Array(elements)) => {
            for element in elements.iter_mut().filter_map(Value::as_object_mut) {
                changed |= migrate_element(element);
            }
        }
        Some(_) => {}
    }

    changed
}

fn legacy_tab_id(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(id) => Value::String(format!("{id:04}")),
            None => Value::String(n.to_string()),
        },
        other => other,
    }
}

fn migrate_tab(tab: &mut Map<String, Value>) -> bool {
    let mut changed = false;
    if tab.contains_key("page_id") && !tab.contains_key("tab_id") {
        if let Some(page_id) = tab.remove("page_id") {
            tab.insert("tab_id".into(), legacy_tab_id(page_id));
            changed = true;
        }
    }
    if tab.contains_key("parent_page_id") && !tab.contains_key("parent_tab_id") {
        if let Some(parent) = tab.remove("parent_page_id") {
            tab.insert("parent_tab_id".into(), legacy_tab_id(parent));
            changed = true;
        }
    }
    changed
}

fn migrate_element(element: &mut Map<String, Value>) -> bool {
    if ELEMENT_FIELDS.iter().all(|field| element.contains_key(*field)) {
        return false;
    }

    let tag_name = element
        .get("tag_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    let legacy_xpath = element
        .get("xpath")
        .and_then(Value::as_str)
        .map(str::to_string);

    element.entry("node_id").or_insert(Value::from(0));
    element.entry("backend_node_id").or_insert(Value::from(0));
    element.entry("frame_id").or_insert(Value::Null);
    element.entry("node_type").or_insert(Value::from(1));
    element.entry("node_value").or_insert(Value::from(""));
    element.entry("node_name").or_insert_with(|| {
        Value::from(tag_name.as_deref().unwrap_or("div").to_uppercase())
    });
    element.entry("bounds").or_insert(Value::Null);
    element
        .entry("x_path")
        .or_insert_with(|| Value::from(legacy_xpath.clone().unwrap_or_default()));
    element.entry("element_hash").or_insert_with(|| {
        let identity = ElementIdentity::from_legacy(
            legacy_xpath.as_deref().unwrap_or(""),
            tag_name.as_deref().unwrap_or(""),
        );
        Value::from(identity.as_str())
    });
    element.remove("xpath");
    true
}
