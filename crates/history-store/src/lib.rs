//! Step history for SoulPilot runs.
//!
//! [`HistoryStore`] owns the append-only list of [`StepRecord`]s a run
//! produces, serializes it to JSON and loads it back, upgrading documents
//! written in older layouts on the way in.
//!
//! [`StepRecord`]: soulpilot_core_types::StepRecord

pub mod errors;
pub mod history;
pub mod migrate;
pub mod store;

pub use errors::HistoryError;
pub use history::{History, RecordedAction, Thought};
pub use migrate::migrate_document;
pub use store::{HistoryStore, SerializeOptions};
