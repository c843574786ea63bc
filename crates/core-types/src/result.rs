use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::CoreError;

/// Outcome of executing one action.
///
/// `success` may only be `Some(true)` on a terminal result; deserialization
/// rejects anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawActionResult")]
pub struct ActionResult {
    /// The run should stop after this result.
    #[serde(default)]
    pub is_done: bool,

    /// Whether the task succeeded; only meaningful when `is_done`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Files produced by the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,

    /// Short note kept in the conversation for later steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_term_memory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,

    /// Show `extracted_content` to the oracle once, then only the memory.
    #[serde(default)]
    pub include_extracted_content_only_once: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ActionResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Terminal result produced by the `done` action.
    pub fn done(success: bool, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            is_done: true,
            success: Some(success),
            long_term_memory: Some(format!("Task completed: {success} - {text}")),
            extracted_content: Some(text),
            ..Default::default()
        }
    }

    /// Terminal failure carrying an error message.
    pub fn failed_done(message: impl Into<String>) -> Self {
        Self {
            is_done: true,
            success: Some(false),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Non-terminal result whose content doubles as memory.
    pub fn extracted(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            long_term_memory: Some(content.clone()),
            extracted_content: Some(content),
            ..Default::default()
        }
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.long_term_memory = Some(memory.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn extracted_once(mut self) -> Self {
        self.include_extracted_content_only_once = true;
        self
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.success == Some(true) && !self.is_done {
            return Err(CoreError::InvalidResult(
                "success=true can only be set on a terminal result (is_done=true); \
                 use success=false or leave it unset for regular actions"
                    .into(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawActionResult {
    #[serde(default)]
    is_done: Option<bool>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    attachments: Option<Vec<String>>,
    #[serde(default)]
    long_term_memory: Option<String>,
    #[serde(default)]
    extracted_content: Option<String>,
    #[serde(default)]
    include_extracted_content_only_once: Option<bool>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl TryFrom<RawActionResult> for ActionResult {
    type Error = CoreError;

    fn try_from(raw: RawActionResult) -> Result<Self, Self::Error> {
        let result = ActionResult {
            is_done: raw.is_done.unwrap_or(false),
            success: raw.success,
            error: raw.error,
            attachments: raw.attachments,
            long_term_memory: raw.long_term_memory,
            extracted_content: raw.extracted_content,
            include_extracted_content_only_once: raw
                .include_extracted_content_only_once
                .unwrap_or(false),
            metadata: raw.metadata,
        };
        result.validate()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_requires_terminal() {
        let err = serde_json::from_value::<ActionResult>(json!({"success": true}));
        assert!(err.is_err());

        let ok: ActionResult =
            serde_json::from_value(json!({"is_done": true, "success": true})).unwrap();
        assert_eq!(ok.success, Some(true));

        let failed: ActionResult = serde_json::from_value(json!({"success": false})).unwrap();
        assert!(!failed.is_done);
    }

    #[test]
    fn legacy_nulls_are_accepted() {
        let result: ActionResult = serde_json::from_value(json!({
            "is_done": null,
            "include_extracted_content_only_once": null,
            "error": "boom"
        }))
        .unwrap();
        assert!(!result.is_done);
        assert!(result.has_error());
    }

    #[test]
    fn done_result_records_memory() {
        let result = ActionResult::done(true, "found 3 items");
        assert!(result.validate().is_ok());
        assert_eq!(result.extracted_content.as_deref(), Some("found 3 items"));
        assert!(result.long_term_memory.unwrap().contains("found 3 items"));
    }

    #[test]
    fn manual_construction_is_checked_by_validate() {
        let bad = ActionResult {
            success: Some(true),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
