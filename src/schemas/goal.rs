use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Status of a goal pad entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Addressed,
    Obsolete,
}

/// A persistent research goal or guiding thought for the mission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GoalEntry {
    pub goal_id: String,
    pub text: String,
    pub status: GoalStatus,
    /// Agent that recorded this goal, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GoalEntry {
    pub fn new(text: impl Into<String>, source_agent: Option<String>) -> Self {
        Self {
            goal_id: Uuid::new_v4().to_string(),
            text: text.into(),
            status: GoalStatus::Active,
            source_agent,
            created_at: Utc::now(),
        }
    }
}
