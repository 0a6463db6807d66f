use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of executing one research step of the plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StepResult {
    pub step_id: String,
    /// Synthesized findings for this step
    pub findings: String,
    /// Note ids produced while researching this step
    #[serde(default)]
    pub note_ids: Vec<String>,
    /// Follow-up questions surfaced by reflection, if any
    #[serde(default)]
    pub open_questions: Vec<String>,
}
