//! Append-only store around [`History`] with JSON persistence.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use soulpilot_core_types::{ActionCatalog, StepRecord, UsageSummary};

use crate::errors::HistoryError;
use crate::history::History;
use crate::migrate::migrate_document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Keep inline screenshots in the output.
    pub include_screenshots: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    history: History,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_history(history: History) -> Self {
        Self { history }
    }

    pub fn append(&mut self, record: StepRecord) {
        self.history.push(record);
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn into_history(self) -> History {
        self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn set_usage(&mut self, usage: UsageSummary) {
        self.history.usage = Some(usage);
    }

    pub fn set_output_schema(&mut self, schema: Value) {
        self.history.output_schema = Some(schema);
    }

    pub fn serialize(&self, options: SerializeOptions) -> Result<Vec<u8>, HistoryError> {
        let mut document = serde_json::to_value(&self.history)?;
        if !options.include_screenshots {
            strip_inline_screenshots(&mut document);
        }
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    /// Decode a document, upgrading legacy layouts first.
    ///
    /// When a catalog is given every recorded action must be known to it.
    pub fn deserialize(bytes: &[u8], catalog: Option<&ActionCatalog>) -> Result<Self, HistoryError> {
        let mut document: Value = serde_json::from_slice(bytes)
            .map_err(|err| HistoryError::malformed(err.to_string()))?;
        if document.get("history").and_then(Value::as_array).is_none() {
            return Err(HistoryError::malformed("missing 'history' list"));
        }
        migrate_document(&mut document);

        let history: History = serde_json::from_value(document)
            .map_err(|err| HistoryError::malformed(err.to_string()))?;

        if let Some(catalog) = catalog {
            for (step, record) in history.history.iter().enumerate() {
                let Some(output) = &record.model_output else {
                    continue;
                };
                for action in output.actions.iter().filter(|a| !a.is_empty()) {
                    catalog
                        .validate(action)
                        .map_err(|source| HistoryError::InvalidAction { step, source })?;
                }
            }
        }

        Ok(Self { history })
    }

    pub async fn save_to_file(
        &self,
        path: impl AsRef<Path>,
        options: SerializeOptions,
    ) -> Result<(), HistoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| HistoryError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let bytes = self.serialize(options)?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| HistoryError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), steps = self.len(), "saved history");
        Ok(())
    }

    pub async fn load_from_file(
        path: impl AsRef<Path>,
        catalog: Option<&ActionCatalog>,
    ) -> Result<Self, HistoryError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| HistoryError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let store = Self::deserialize(&bytes, catalog)?;
        debug!(path = %path.display(), steps = store.len(), "loaded history");
        Ok(store)
    }
}

fn strip_inline_screenshots(document: &mut Value) {
    let Some(steps) = document.get_mut("history").and_then(Value::as_array_mut) else {
        return;
    };
    for step in steps {
        if let Some(state) = step.get_mut("state").and_then(Value::as_object_mut) {
            state.remove("screenshot");
        }
    }
}
