//! Shared data model for the SoulPilot task driver.
//!
//! Everything that crosses a crate boundary lives here: actions and the
//! catalog that validates them, oracle decisions, action results,
//! environment snapshots, and the per-step records that make up a run's
//! history.

pub mod action;
pub mod catalog;
pub mod decision;
pub mod environment;
pub mod errors;
pub mod ids;
pub mod record;
pub mod result;
pub mod usage;

pub use action::{Action, DONE_ACTION, INDEX_PARAM};
pub use catalog::{schema_of, ActionCatalog, ActionSpec, DecisionSchema, DoneParams, SchemaOptions};
pub use decision::DecisionOutput;
pub use environment::{
    Bounds, ElementDescriptor, ElementIdentity, EnvironmentSnapshot, EnvironmentStateHistory,
    InteractedElement, ObserveOptions, TabInfo,
};
pub use errors::CoreError;
pub use ids::TaskId;
pub use record::{StepMetadata, StepRecord};
pub use result::ActionResult;
pub use usage::{ModelUsage, TokenUsage, UsageSummary};
