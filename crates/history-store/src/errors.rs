use std::path::PathBuf;

use thiserror::Error;

use soulpilot_core_types::CoreError;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed history document: {0}")]
    Malformed(String),

    #[error("history step {step} references an invalid action: {source}")]
    InvalidAction {
        step: usize,
        #[source]
        source: CoreError,
    },

    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HistoryError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
