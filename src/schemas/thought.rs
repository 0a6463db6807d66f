use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Working-memory entry: a recent thought or focus point from an agent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ThoughtEntry {
    pub thought_id: String,
    pub agent_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ThoughtEntry {
    pub fn new(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            thought_id: Uuid::new_v4().to_string(),
            agent_name: agent_name.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
