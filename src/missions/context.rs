//! In-memory state of a single mission.
//!
//! The full context is serialized to the missions table as JSON on every
//! persisted mutation, and rehydrated on startup. `migrate_context` papers
//! over rows written by older builds before deserialization.

use crate::missions::phases::ExecutionPhase;
use crate::schemas::{GoalEntry, Note, Plan, StepResult, ThoughtEntry};
use crate::types::{LogStatus, MissionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionContext {
    pub mission_id: String,
    pub user_request: String,
    pub status: MissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Finished section content keyed by section id.
    #[serde(default)]
    pub report_content: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_report: Option<String>,
    #[serde(default)]
    pub goal_pad: Vec<GoalEntry>,
    #[serde(default)]
    pub thought_pad: Vec<ThoughtEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_scratchpad: Option<String>,
    #[serde(default)]
    pub step_results: Vec<StepResult>,
    #[serde(default)]
    pub execution_log: Vec<ExecutionLogEntry>,
    #[serde(default)]
    pub writing_suggestions: Vec<String>,
    #[serde(default)]
    pub current_phase: Option<ExecutionPhase>,
    #[serde(default)]
    pub completed_phases: Vec<ExecutionPhase>,
    /// Per-phase checkpoint payloads, keyed by phase name. Saving a
    /// checkpoint for a phase merges into any existing payload.
    #[serde(default)]
    pub phase_checkpoints: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: MissionStats,
    /// Stable reference aliases (ref1, ref2, ...) handed to agents in place
    /// of raw note and document ids.
    #[serde(default)]
    pub reference_id_map: HashMap<String, String>,
    #[serde(default)]
    pub reference_id_reverse: HashMap<String, String>,
    #[serde(default)]
    pub reference_id_counter: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MissionContext {
    pub fn new(mission_id: &str, user_request: &str) -> Self {
        let now = Utc::now();
        Self {
            mission_id: mission_id.to_string(),
            user_request: user_request.to_string(),
            status: MissionStatus::Planning,
            error_info: None,
            plan: None,
            notes: Vec::new(),
            report_content: HashMap::new(),
            final_report: None,
            goal_pad: Vec::new(),
            thought_pad: Vec::new(),
            agent_scratchpad: None,
            step_results: Vec::new(),
            execution_log: Vec::new(),
            writing_suggestions: Vec::new(),
            current_phase: None,
            completed_phases: Vec::new(),
            phase_checkpoints: HashMap::new(),
            metadata: HashMap::new(),
            stats: MissionStats::default(),
            reference_id_map: HashMap::new(),
            reference_id_reverse: HashMap::new(),
            reference_id_counter: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the stable alias for an original id, allocating a new one
    /// on first sight. Idempotent: the same id always maps to the same
    /// alias.
    pub fn reference_alias(&mut self, original_id: &str) -> String {
        if let Some(alias) = self.reference_id_map.get(original_id) {
            return alias.clone();
        }
        self.reference_id_counter += 1;
        let alias = format!("ref{}", self.reference_id_counter);
        self.reference_id_map
            .insert(original_id.to_string(), alias.clone());
        self.reference_id_reverse
            .insert(alias.clone(), original_id.to_string());
        alias
    }

    /// Resolves an alias back to the original id.
    pub fn resolve_reference(&self, alias: &str) -> Option<&String> {
        self.reference_id_reverse.get(alias)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub log_id: String,
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<String>,
    pub status: LogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_interactions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_tokens: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionStats {
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub total_prompt_tokens: i64,
    #[serde(default)]
    pub total_completion_tokens: i64,
    #[serde(default)]
    pub total_native_tokens: i64,
    #[serde(default)]
    pub total_web_search_calls: u64,
    /// Call ids already counted, to keep retried model calls from
    /// inflating the totals.
    #[serde(default)]
    pub counted_call_ids: HashSet<String>,
}

/// Repairs context JSON written by earlier builds so deserialization into
/// the current `MissionContext` succeeds.
///
/// Fills missing note timestamps, rebuilds `tool_selection` metadata from
/// the comprehensive settings snapshot, and defaults `use_web_search` on.
pub fn migrate_context(mut value: serde_json::Value) -> serde_json::Value {
    let now = serde_json::Value::String(Utc::now().to_rfc3339());

    if let Some(notes) = value.get_mut("notes").and_then(|n| n.as_array_mut()) {
        for note in notes {
            if let Some(obj) = note.as_object_mut() {
                if !obj.contains_key("created_at") || obj["created_at"].is_null() {
                    obj.insert("created_at".to_string(), now.clone());
                }
                if !obj.contains_key("updated_at") || obj["updated_at"].is_null() {
                    let created = obj["created_at"].clone();
                    obj.insert("updated_at".to_string(), created);
                }
            }
        }
    }

    if let Some(metadata) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        let needs_tool_selection = !metadata.contains_key("tool_selection")
            || metadata["tool_selection"].is_null();
        if needs_tool_selection {
            let from_settings = metadata
                .get("comprehensive_settings")
                .and_then(|s| s.get("tool_selection"))
                .cloned();
            let tool_selection = from_settings.unwrap_or_else(|| {
                serde_json::json!({"web_search": true, "local_rag": false})
            });
            metadata.insert("tool_selection".to_string(), tool_selection);
        }

        if let Some(selection) = metadata
            .get_mut("tool_selection")
            .and_then(|s| s.as_object_mut())
        {
            if !selection.contains_key("web_search") || selection["web_search"].is_null() {
                selection.insert("web_search".to_string(), serde_json::Value::Bool(true));
            }
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_aliases_are_stable_and_sequential() {
        let mut ctx = MissionContext::new("m1", "test");
        let a = ctx.reference_alias("note-abc");
        let b = ctx.reference_alias("doc-xyz");
        let a_again = ctx.reference_alias("note-abc");

        assert_eq!(a, "ref1");
        assert_eq!(b, "ref2");
        assert_eq!(a_again, "ref1");
        assert_eq!(ctx.resolve_reference("ref2"), Some(&"doc-xyz".to_string()));
        assert_eq!(ctx.resolve_reference("ref9"), None);
    }

    #[test]
    fn migration_fills_note_timestamps() {
        let raw = serde_json::json!({
            "notes": [
                {"note_id": "n1", "content": "old"},
                {"note_id": "n2", "content": "newer", "created_at": "2025-01-01T00:00:00Z"}
            ],
            "metadata": {}
        });

        let migrated = migrate_context(raw);
        let notes = migrated["notes"].as_array().unwrap();
        assert!(notes[0]["created_at"].is_string());
        assert!(notes[0]["updated_at"].is_string());
        assert_eq!(notes[1]["created_at"], "2025-01-01T00:00:00Z");
        assert_eq!(notes[1]["updated_at"], "2025-01-01T00:00:00Z");
    }

    #[test]
    fn migration_rebuilds_tool_selection_from_settings() {
        let raw = serde_json::json!({
            "metadata": {
                "comprehensive_settings": {
                    "tool_selection": {"web_search": false, "local_rag": true}
                }
            }
        });

        let migrated = migrate_context(raw);
        let selection = &migrated["metadata"]["tool_selection"];
        assert_eq!(selection["web_search"], false);
        assert_eq!(selection["local_rag"], true);
    }

    #[test]
    fn migration_defaults_web_search_on() {
        let raw = serde_json::json!({
            "metadata": {
                "tool_selection": {"local_rag": false}
            }
        });

        let migrated = migrate_context(raw);
        assert_eq!(migrated["metadata"]["tool_selection"]["web_search"], true);
    }

    #[test]
    fn context_roundtrips_through_json() {
        let mut ctx = MissionContext::new("m1", "investigate rust async");
        ctx.reference_alias("n1");
        ctx.stats.total_cost = 0.42;

        let json = serde_json::to_value(&ctx).unwrap();
        let back: MissionContext = serde_json::from_value(json).unwrap();
        assert_eq!(back.mission_id, "m1");
        assert_eq!(back.reference_id_counter, 1);
        assert!((back.stats.total_cost - 0.42).abs() < f64::EPSILON);
    }
}
