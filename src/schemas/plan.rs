use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The research plan for a mission: a report outline plus the research
/// sections that feed it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Plan {
    /// Restated goal the plan is built around
    pub mission_goal: String,
    /// Nested outline of the final report
    pub report_outline: Vec<ReportSection>,
    /// Sections requiring dedicated research during structured_research
    #[serde(default)]
    pub research_sections: Vec<PlanStep>,
}

/// One section of the report outline. Sections nest arbitrarily deep;
/// numbering is derived from position when the draft is built.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportSection {
    pub section_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub subsections: Vec<ReportSection>,
}

impl ReportSection {
    pub fn new(section_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            title: title.into(),
            description: None,
            subsections: Vec::new(),
        }
    }

    pub fn with_subsections(mut self, subsections: Vec<ReportSection>) -> Self {
        self.subsections = subsections;
        self
    }
}

/// A single research step tied to an outline section.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanStep {
    pub step_id: String,
    /// Outline section this step researches
    pub section_id: String,
    pub description: String,
}
