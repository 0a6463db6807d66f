//! Mission execution phases and resume logic.
//!
//! A mission walks through a fixed pipeline of phases. Each phase can save a
//! checkpoint while in flight and is marked completed when it finishes.
//! Resuming a stopped or failed mission picks the right phase from the
//! checkpoint and completion records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    NotStarted,
    InitialAnalysis,
    InitialResearch,
    OutlineGeneration,
    StructuredResearch,
    NotePreparation,
    Writing,
    TitleGeneration,
    CitationProcessing,
    Completed,
}

/// Pipeline order. `NotStarted` and `Completed` are markers, not workable
/// phases, so they are excluded.
pub const PHASE_ORDER: [ExecutionPhase; 8] = [
    ExecutionPhase::InitialAnalysis,
    ExecutionPhase::InitialResearch,
    ExecutionPhase::OutlineGeneration,
    ExecutionPhase::StructuredResearch,
    ExecutionPhase::NotePreparation,
    ExecutionPhase::Writing,
    ExecutionPhase::TitleGeneration,
    ExecutionPhase::CitationProcessing,
];

impl ExecutionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPhase::NotStarted => "not_started",
            ExecutionPhase::InitialAnalysis => "initial_analysis",
            ExecutionPhase::InitialResearch => "initial_research",
            ExecutionPhase::OutlineGeneration => "outline_generation",
            ExecutionPhase::StructuredResearch => "structured_research",
            ExecutionPhase::NotePreparation => "note_preparation",
            ExecutionPhase::Writing => "writing",
            ExecutionPhase::TitleGeneration => "title_generation",
            ExecutionPhase::CitationProcessing => "citation_processing",
            ExecutionPhase::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(ExecutionPhase::NotStarted),
            "initial_analysis" => Some(ExecutionPhase::InitialAnalysis),
            "initial_research" => Some(ExecutionPhase::InitialResearch),
            "outline_generation" => Some(ExecutionPhase::OutlineGeneration),
            "structured_research" => Some(ExecutionPhase::StructuredResearch),
            "note_preparation" => Some(ExecutionPhase::NotePreparation),
            "writing" => Some(ExecutionPhase::Writing),
            "title_generation" => Some(ExecutionPhase::TitleGeneration),
            "citation_processing" => Some(ExecutionPhase::CitationProcessing),
            "completed" => Some(ExecutionPhase::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the phase a resumed mission should enter.
///
/// Priority: a phase that has a saved checkpoint but was never completed
/// wins. Failing that, the recorded checkpoint phase itself. Failing that,
/// the first uncompleted phase in pipeline order.
pub fn next_phase(
    completed: &[ExecutionPhase],
    checkpoint_phase: Option<ExecutionPhase>,
    checkpoints: &HashMap<String, serde_json::Value>,
) -> ExecutionPhase {
    for phase in PHASE_ORDER {
        if checkpoints.get(phase.as_str()).is_some_and(checkpoint_has_data)
            && !completed.contains(&phase)
        {
            return phase;
        }
    }

    if let Some(phase) = checkpoint_phase {
        if phase != ExecutionPhase::NotStarted
            && phase != ExecutionPhase::Completed
            && !completed.contains(&phase)
        {
            return phase;
        }
    }

    for phase in PHASE_ORDER {
        if !completed.contains(&phase) {
            return phase;
        }
    }

    ExecutionPhase::Completed
}

/// An empty checkpoint payload does not mark a phase as in progress.
fn checkpoint_has_data(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(_) => true,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Summary handed to a client that wants to resume a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeCheckpoint {
    pub mission_id: String,
    pub status: String,
    pub resume_phase: ExecutionPhase,
    pub completed_phases: Vec<ExecutionPhase>,
    pub checkpointed_phases: Vec<String>,
    pub has_plan: bool,
    /// Action and timestamp of the last recorded execution log entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<LastActivity>,
    pub note_count: usize,
    pub section_count: usize,
    pub sections_with_content: usize,
    /// Per-section research progress, only present while in or past
    /// structured research.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_research_progress: Option<StructuredResearchProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastActivity {
    pub agent_name: String,
    pub action: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResearchProgress {
    pub total_sections: usize,
    pub sections_researched: usize,
    pub remaining_section_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_string_roundtrip() {
        for phase in PHASE_ORDER {
            assert_eq!(ExecutionPhase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(ExecutionPhase::parse("nonsense"), None);
    }

    #[test]
    fn checkpointed_uncompleted_phase_wins() {
        let completed = vec![
            ExecutionPhase::InitialAnalysis,
            ExecutionPhase::InitialResearch,
        ];
        let mut checkpoints = HashMap::new();
        checkpoints.insert(
            "structured_research".to_string(),
            serde_json::json!({"done_sections": ["s1"]}),
        );

        let phase = next_phase(
            &completed,
            Some(ExecutionPhase::OutlineGeneration),
            &checkpoints,
        );
        assert_eq!(phase, ExecutionPhase::StructuredResearch);
    }

    #[test]
    fn checkpoint_phase_used_when_no_pending_checkpoints() {
        let completed = vec![ExecutionPhase::Writing];
        let mut checkpoints = HashMap::new();
        checkpoints.insert("writing".to_string(), serde_json::json!({}));

        // The only checkpointed phase is already completed, so fall back
        // to the recorded checkpoint phase.
        let phase = next_phase(&completed, Some(ExecutionPhase::TitleGeneration), &checkpoints);
        assert_eq!(phase, ExecutionPhase::TitleGeneration);
    }

    #[test]
    fn completed_checkpoint_phase_is_not_resumed() {
        let completed = vec![
            ExecutionPhase::InitialAnalysis,
            ExecutionPhase::InitialResearch,
        ];
        // The checkpoint names a phase that already finished; resuming
        // must advance past it.
        let phase = next_phase(
            &completed,
            Some(ExecutionPhase::InitialResearch),
            &HashMap::new(),
        );
        assert_eq!(phase, ExecutionPhase::OutlineGeneration);
    }

    #[test]
    fn empty_checkpoint_does_not_mark_a_phase_in_progress() {
        let mut checkpoints = HashMap::new();
        checkpoints.insert("writing".to_string(), serde_json::json!({}));
        let phase = next_phase(&[], None, &checkpoints);
        assert_eq!(phase, ExecutionPhase::InitialAnalysis);
    }

    #[test]
    fn first_uncompleted_phase_as_last_resort() {
        let completed = vec![
            ExecutionPhase::InitialAnalysis,
            ExecutionPhase::InitialResearch,
        ];
        let phase = next_phase(&completed, None, &HashMap::new());
        assert_eq!(phase, ExecutionPhase::OutlineGeneration);
    }

    #[test]
    fn all_phases_completed_yields_completed() {
        let phase = next_phase(&PHASE_ORDER, None, &HashMap::new());
        assert_eq!(phase, ExecutionPhase::Completed);
    }
}
