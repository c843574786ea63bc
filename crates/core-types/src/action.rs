//! A single action requested by the oracle.
//!
//! On the wire an action is a one-key object `{"click": {"index": 3}}`.
//! The empty object `{}` is the "empty action", which carries no name and
//! is treated as "the oracle forgot to act".

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::errors::CoreError;

/// Name of the terminal action every catalog carries.
pub const DONE_ACTION: &str = "done";

/// Parameter holding the index of the element an action targets.
pub const INDEX_PARAM: &str = "index";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    name: String,
    params: Map<String, Value>,
}

impl Action {
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Build an action from a JSON parameter value (object or null).
    pub fn from_value(name: impl Into<String>, params: Value) -> Result<Self, CoreError> {
        let name = name.into();
        match params {
            Value::Object(map) => Ok(Self::new(name, map)),
            Value::Null => Ok(Self::new(name, Map::new())),
            other => Err(CoreError::invalid_params(
                name,
                format!("parameters must be an object, got {other}"),
            )),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The terminal action with its two required fields.
    pub fn done(success: bool, text: impl Into<String>) -> Self {
        let mut params = Map::new();
        params.insert("success".into(), Value::Bool(success));
        params.insert("text".into(), Value::String(text.into()));
        Self::new(DONE_ACTION, params)
    }

    /// The terminal action of a run bound to an output schema.
    pub fn structured_done(success: bool, data: Value) -> Self {
        let mut params = Map::new();
        params.insert("success".into(), Value::Bool(success));
        params.insert("data".into(), data);
        Self::new(DONE_ACTION, params)
    }

    /// Final text carried by a terminal action: `data` as JSON when present,
    /// otherwise `text`.
    pub fn done_text(&self) -> Option<String> {
        if !self.is_done() {
            return None;
        }
        match self.params.get("data") {
            Some(data) => Some(data.to_string()),
            None => self
                .params
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.name == DONE_ACTION
    }

    /// Element index this action targets, if any.
    pub fn index(&self) -> Option<u32> {
        self.params
            .get(INDEX_PARAM)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn set_index(&mut self, index: u32) {
        self.params.insert(INDEX_PARAM.into(), json!(index));
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.set_index(index);
        self
    }

    pub fn to_value(&self) -> Value {
        if self.is_empty() {
            return Value::Object(Map::new());
        }
        let mut outer = Map::new();
        outer.insert(self.name.clone(), Value::Object(self.params.clone()));
        Value::Object(outer)
    }

    /// Compact rendering for logs: `click(index=3, text=Search)`.
    pub fn summary(&self) -> String {
        let args: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) if s.chars().count() > 30 => {
                        format!("{}...", s.chars().take(30).collect::<String>())
                    }
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{key}={rendered}")
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        let Some((name, params)) = entries.next() else {
            return Ok(Action::empty());
        };
        if entries.next().is_some() {
            return Err(D::Error::custom(
                "an action object must name exactly one action",
            ));
        }
        Action::from_value(name, params).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_key_object() {
        let action: Action = serde_json::from_value(json!({"click": {"index": 4}})).unwrap();
        assert_eq!(action.name(), "click");
        assert_eq!(action.index(), Some(4));
        assert_eq!(action.to_value(), json!({"click": {"index": 4}}));
    }

    #[test]
    fn empty_object_is_empty_action() {
        let action: Action = serde_json::from_value(json!({})).unwrap();
        assert!(action.is_empty());
        assert_eq!(serde_json::to_value(&action).unwrap(), json!({}));
    }

    #[test]
    fn rejects_multiple_names() {
        let err = serde_json::from_value::<Action>(json!({"click": {}, "scroll": {}}));
        assert!(err.is_err());
    }

    #[test]
    fn rejects_scalar_params() {
        let err = serde_json::from_value::<Action>(json!({"click": 3}));
        assert!(err.is_err());
    }

    #[test]
    fn rebinding_index_overwrites_param() {
        let mut action = Action::from_value("input", json!({"index": 2, "text": "hi"})).unwrap();
        action.set_index(9);
        assert_eq!(action.index(), Some(9));
        assert_eq!(action.param("text"), Some(&json!("hi")));
    }

    #[test]
    fn done_carries_success_and_text() {
        let action = Action::done(false, "gave up");
        assert!(action.is_done());
        assert_eq!(action.param("success"), Some(&json!(false)));
        assert_eq!(action.index(), None);
        assert_eq!(action.done_text().as_deref(), Some("gave up"));
    }

    #[test]
    fn structured_done_text_is_the_data_json() {
        let action = Action::structured_done(true, json!({"items": 2}));
        assert_eq!(action.done_text().as_deref(), Some(r#"{"items":2}"#));
        assert_eq!(Action::from_value("click", json!({"index": 1})).unwrap().done_text(), None);
    }
}
