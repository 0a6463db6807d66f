use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Where a note's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NoteSourceType {
    /// Fetched from the web during research
    Web,
    /// Extracted from a document in the user's library
    Document,
    /// Produced by an agent without an external source
    Internal,
}

/// Source details carried alongside a note. For web notes with
/// `fetched_full_content` set, `full_text` holds the complete page text
/// (the note content itself is the synthesized version).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SourceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Library document this note's chunk belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub fetched_full_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
}

/// A note gathered during research.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Note {
    pub note_id: String,
    pub content: String,
    pub source_type: NoteSourceType,
    /// URL for web notes, chunk id for document notes
    pub source_id: String,
    #[serde(default = "default_relevant")]
    pub is_relevant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<SourceMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_relevant() -> bool {
    true
}

impl Note {
    pub fn new(content: impl Into<String>, source_type: NoteSourceType, source_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            note_id: Uuid::new_v4().to_string(),
            content: content.into(),
            source_type,
            source_id: source_id.into(),
            is_relevant: true,
            source_metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.source_metadata = Some(metadata);
        self
    }
}
