//! Mission state engine: context, phase pipeline, the central manager,
//! and the preparation service.

pub mod context;
pub mod manager;
pub mod phases;
pub mod service;

pub use context::{ExecutionLogEntry, MissionContext, MissionStats};
pub use manager::ContextManager;
pub use phases::{ExecutionPhase, ResumeCheckpoint};
pub use service::MissionService;
