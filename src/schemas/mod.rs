//! Data schemas shared by the mission engine.
//!
//! These types live inside the persisted mission context, so every change
//! here must stay deserializable against contexts already in the database
//! (see the migration pass in [`crate::missions::context`]).

/// Goal pad entries.
pub mod goal;
/// Research notes and their source metadata.
pub mod notes;
/// Research plans and report outlines.
pub mod plan;
/// Per-step research results.
pub mod research;
/// Thought pad entries.
pub mod thought;

pub use goal::{GoalEntry, GoalStatus};
pub use notes::{Note, NoteSourceType, SourceMetadata};
pub use plan::{Plan, PlanStep, ReportSection};
pub use research::StepResult;
pub use thought::ThoughtEntry;
