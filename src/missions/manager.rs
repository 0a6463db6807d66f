//! Central coordinator for mission state.
//!
//! All mutations go through the `ContextManager`: it updates the in-memory
//! context under a lock, persists a snapshot to the database, and publishes
//! an event on the update bus. Locks are never held across awaits; the
//! context is cloned before any async persistence.

use crate::config::ResearchConfig;
use crate::db::Store;
use crate::events::{MissionEvent, UpdateBus};
use crate::missions::context::{migrate_context, ExecutionLogEntry, MissionContext};
use crate::missions::phases::{
    next_phase, ExecutionPhase, LastActivity, ResumeCheckpoint, StructuredResearchProgress,
    PHASE_ORDER,
};
use crate::schemas::{
    GoalEntry, GoalStatus, Note, NoteSourceType, Plan, ReportSection, StepResult, ThoughtEntry,
};
use crate::types::{AppError, MissionStatus, Result};
use crate::utils::extract_report_title;
use crate::utils::sanitize::sanitize_json;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Thought pad entries beyond this are dropped oldest-first.
const MAX_THOUGHT_PAD_ENTRIES: usize = 50;

/// Minimum per-mission concurrency when derived from a user limit.
const MIN_MISSION_CONCURRENCY: usize = 3;

pub struct ContextManager {
    store: Arc<Store>,
    bus: UpdateBus,
    research: ResearchConfig,
    data_dir: PathBuf,
    contexts: RwLock<HashMap<String, MissionContext>>,
    semaphores: RwLock<HashMap<String, Arc<Semaphore>>>,
    /// URLs already turned into documents, per mission.
    processed_sources: RwLock<HashMap<String, HashSet<String>>>,
}

impl ContextManager {
    pub fn new(store: Arc<Store>, bus: UpdateBus, research: ResearchConfig, data_dir: PathBuf) -> Self {
        Self {
            store,
            bus,
            research,
            data_dir,
            contexts: RwLock::new(HashMap::new()),
            semaphores: RwLock::new(HashMap::new()),
            processed_sources: RwLock::new(HashMap::new()),
        }
    }

    /// Rehydrates all persisted missions into memory. A mission whose
    /// stored context is missing or fails to deserialize gets a bare
    /// context rebuilt from the mission row rather than aborting startup.
    pub async fn load_all(&self) -> Result<usize> {
        let rows = self.store.get_all_missions().await?;
        let mut loaded = 0;

        for row in rows {
            let mut ctx = match row.mission_context {
                Some(raw) => match serde_json::from_value::<MissionContext>(migrate_context(raw)) {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        tracing::warn!(mission_id = %row.id, error = %e, "Stored mission context is unreadable, rebuilding from row");
                        MissionContext::new(&row.id, &row.user_request)
                    }
                },
                None => {
                    tracing::warn!(mission_id = %row.id, "Mission row has no stored context, rebuilding from row");
                    MissionContext::new(&row.id, &row.user_request)
                }
            };
            // The status column is authoritative over the snapshot.
            ctx.status = row.status;
            ctx.error_info = row.error_info;
            self.contexts.write().insert(row.id.clone(), ctx);
            loaded += 1;
        }

        tracing::info!(count = loaded, "Hydrated missions from database");
        Ok(loaded)
    }

    // ============= Lifecycle =============

    pub async fn start_mission(&self, chat_id: &str, user_request: &str) -> Result<MissionContext> {
        let mission_id = Uuid::new_v4().to_string();
        let ctx = MissionContext::new(&mission_id, user_request);

        self.contexts.write().insert(mission_id.clone(), ctx.clone());

        let snapshot = sanitize_json(serde_json::to_value(&ctx)?);
        if let Err(e) = self
            .store
            .create_mission(&mission_id, chat_id, user_request, &snapshot)
            .await
        {
            // Roll back the in-memory entry so a retried request starts clean.
            self.contexts.write().remove(&mission_id);
            return Err(e);
        }

        tracing::info!(mission_id = %mission_id, "Mission created");
        Ok(ctx)
    }

    pub fn get_context(&self, mission_id: &str) -> Option<MissionContext> {
        self.contexts.read().get(mission_id).cloned()
    }

    pub fn mission_exists(&self, mission_id: &str) -> bool {
        self.contexts.read().contains_key(mission_id)
    }

    pub async fn update_status(
        &self,
        mission_id: &str,
        status: MissionStatus,
        error_info: Option<String>,
    ) -> Result<()> {
        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.status = status;
            ctx.error_info = error_info.clone();
            ctx.touch();
        }

        // Terminal missions no longer need a concurrency slot.
        if status.is_terminal() {
            self.semaphores.write().remove(mission_id);
        }

        self.store
            .update_mission_status(mission_id, status, error_info.as_deref())
            .await?;
        self.persist_context(mission_id).await;

        self.bus.publish(MissionEvent::Status {
            mission_id: mission_id.to_string(),
            status: status.as_str().to_string(),
            error_info,
        });

        Ok(())
    }

    /// Stops a mission if it is still live, then drops it from memory
    /// and its bookkeeping maps. The database row is left in place.
    pub async fn remove_mission(&self, mission_id: &str) -> Result<()> {
        let live = self
            .get_context(mission_id)
            .map(|ctx| !ctx.status.is_terminal())
            .unwrap_or(false);
        if live {
            self.update_status(mission_id, MissionStatus::Stopped, None)
                .await?;
        }

        self.contexts.write().remove(mission_id);
        self.semaphores.write().remove(mission_id);
        self.processed_sources.write().remove(mission_id);
        Ok(())
    }

    // ============= Concurrency =============

    /// Returns the mission's request semaphore, sizing it on first use.
    /// With a user-supplied limit the mission gets half of it, floored at
    /// three; otherwise the configured default applies.
    pub fn semaphore_for(&self, mission_id: &str, user_limit: Option<usize>) -> Arc<Semaphore> {
        let mut semaphores = self.semaphores.write();
        semaphores
            .entry(mission_id.to_string())
            .or_insert_with(|| {
                let permits = match user_limit {
                    Some(limit) => MIN_MISSION_CONCURRENCY.max(limit / 2),
                    None => self.research.max_concurrent_requests,
                };
                Arc::new(Semaphore::new(permits))
            })
            .clone()
    }

    // ============= Phases and checkpoints =============

    pub async fn set_phase(&self, mission_id: &str, phase: ExecutionPhase) -> Result<()> {
        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.current_phase = Some(phase);
            ctx.touch();
        }

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::Phase {
            mission_id: mission_id.to_string(),
            phase: phase.as_str().to_string(),
        });
        Ok(())
    }

    pub async fn complete_phase(&self, mission_id: &str, phase: ExecutionPhase) -> Result<()> {
        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            if !ctx.completed_phases.contains(&phase) {
                ctx.completed_phases.push(phase);
            }
            ctx.touch();
        }

        self.persist_context(mission_id).await;
        Ok(())
    }

    /// Saves checkpoint data for a phase. Object payloads merge into any
    /// existing checkpoint for that phase; other payloads replace it.
    pub async fn save_phase_checkpoint(
        &self,
        mission_id: &str,
        phase: ExecutionPhase,
        data: serde_json::Value,
    ) -> Result<()> {
        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;

            let key = phase.as_str().to_string();
            let merged = match (ctx.phase_checkpoints.remove(&key), data) {
                (
                    Some(serde_json::Value::Object(mut existing)),
                    serde_json::Value::Object(incoming),
                ) => {
                    for (k, v) in incoming {
                        existing.insert(k, v);
                    }
                    serde_json::Value::Object(existing)
                }
                (_, data) => data,
            };
            ctx.phase_checkpoints.insert(key, merged);
            ctx.touch();
        }

        self.persist_context(mission_id).await;
        Ok(())
    }

    /// Builds the checkpoint summary a client uses to resume a mission.
    pub fn get_resume_checkpoint(&self, mission_id: &str) -> Result<ResumeCheckpoint> {
        let contexts = self.contexts.read();
        let ctx = contexts
            .get(mission_id)
            .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;

        let resume_phase = next_phase(
            &ctx.completed_phases,
            ctx.current_phase,
            &ctx.phase_checkpoints,
        );

        let section_ids = ctx
            .plan
            .as_ref()
            .map(|p| collect_section_ids(&p.report_outline))
            .unwrap_or_default();
        let sections_with_content = section_ids
            .iter()
            .filter(|id| ctx.report_content.contains_key(*id))
            .count();

        let structured_research_progress = if resume_phase == ExecutionPhase::StructuredResearch
            || ctx
                .completed_phases
                .contains(&ExecutionPhase::StructuredResearch)
        {
            let researched: HashSet<&str> = ctx
                .step_results
                .iter()
                .map(|r| r.step_id.as_str())
                .collect();
            let remaining: Vec<String> = section_ids
                .iter()
                .filter(|id| !researched.contains(id.as_str()))
                .cloned()
                .collect();
            Some(StructuredResearchProgress {
                total_sections: section_ids.len(),
                sections_researched: section_ids.len() - remaining.len(),
                remaining_section_ids: remaining,
            })
        } else {
            None
        };

        Ok(ResumeCheckpoint {
            mission_id: mission_id.to_string(),
            status: ctx.status.as_str().to_string(),
            resume_phase,
            completed_phases: ctx.completed_phases.clone(),
            checkpointed_phases: {
                let mut phases: Vec<String> = ctx.phase_checkpoints.keys().cloned().collect();
                phases.sort_by_key(|p| {
                    PHASE_ORDER
                        .iter()
                        .position(|ph| ph.as_str() == p)
                        .unwrap_or(usize::MAX)
                });
                phases
            },
            has_plan: ctx.plan.is_some(),
            last_activity: ctx.execution_log.last().map(|entry| LastActivity {
                agent_name: entry.agent_name.clone(),
                action: entry.action.clone(),
                timestamp: entry.timestamp,
            }),
            note_count: ctx.notes.len(),
            section_count: section_ids.len(),
            sections_with_content,
            structured_research_progress,
        })
    }

    // ============= Plan and report content =============

    /// Stores the approved plan. A mission still in planning moves to
    /// running.
    pub async fn store_plan(&self, mission_id: &str, plan: Plan) -> Result<()> {
        let became_running = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.plan = Some(plan.clone());
            let transition = ctx.status == MissionStatus::Planning;
            if transition {
                ctx.status = MissionStatus::Running;
            }
            ctx.touch();
            transition
        };

        if became_running {
            self.store
                .update_mission_status(mission_id, MissionStatus::Running, None)
                .await?;
        }
        self.persist_context(mission_id).await;

        self.bus.publish(MissionEvent::Plan {
            mission_id: mission_id.to_string(),
            plan: serde_json::to_value(&plan).unwrap_or_default(),
        });
        if became_running {
            self.bus.publish(MissionEvent::Status {
                mission_id: mission_id.to_string(),
                status: MissionStatus::Running.as_str().to_string(),
                error_info: None,
            });
        }
        Ok(())
    }

    pub async fn store_step_result(&self, mission_id: &str, result: StepResult) -> Result<()> {
        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            // A retried step replaces its earlier result.
            ctx.step_results.retain(|r| r.step_id != result.step_id);
            ctx.step_results.push(result);
            ctx.touch();
        }

        self.persist_context(mission_id).await;
        Ok(())
    }

    /// Stores finished content for one report section and broadcasts the
    /// rebuilt draft.
    pub async fn store_report_section(
        &self,
        mission_id: &str,
        section_id: &str,
        content: &str,
    ) -> Result<()> {
        let draft = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.report_content
                .insert(section_id.to_string(), content.to_string());
            ctx.touch();
            build_draft(ctx)
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::Draft {
            mission_id: mission_id.to_string(),
            draft,
        });
        Ok(())
    }

    /// Stores the final report, persists it as a new current report
    /// version, and completes the mission.
    pub async fn store_final_report(&self, mission_id: &str, report: &str) -> Result<()> {
        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.final_report = Some(report.to_string());
            ctx.touch();
        }

        let title = extract_report_title(report);
        self.store
            .create_research_report(mission_id, report, title.as_deref(), None, true)
            .await?;

        self.update_status(mission_id, MissionStatus::Completed, None)
            .await?;
        Ok(())
    }

    pub fn build_draft_from_context(&self, mission_id: &str) -> Result<String> {
        let contexts = self.contexts.read();
        let ctx = contexts
            .get(mission_id)
            .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
        Ok(build_draft(ctx))
    }

    // ============= Notes =============

    pub async fn add_note(&self, mission_id: &str, note: Note) -> Result<()> {
        let (note_count, capture) = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.notes.push(note.clone());
            ctx.touch();
            let capture = match (
                ctx.metadata
                    .get("generated_document_group_id")
                    .and_then(|v| v.as_str()),
                ctx.metadata.get("user_id").and_then(|v| v.as_str()),
            ) {
                (Some(group), Some(user)) => Some((group.to_string(), user.to_string())),
                _ => None,
            };
            (ctx.notes.len(), capture)
        };

        // Note sources are filed into the generated group as they arrive.
        // A capture failure never blocks the note itself.
        if let Some((group_id, user_id)) = capture {
            if let Err(e) = self
                .process_note_for_group(mission_id, &note, &user_id, &group_id)
                .await
            {
                tracing::warn!(mission_id = %mission_id, note_id = %note.note_id, error = %e, "Failed to file note source into document group");
            }
        }

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::Notes {
            mission_id: mission_id.to_string(),
            note_count,
        });
        Ok(())
    }

    pub async fn remove_note(&self, mission_id: &str, note_id: &str) -> Result<()> {
        let note_count = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            let before = ctx.notes.len();
            ctx.notes.retain(|n| n.note_id != note_id);
            if ctx.notes.len() == before {
                return Err(AppError::NotFound(format!(
                    "Note {} not found in mission {}",
                    note_id, mission_id
                )));
            }
            ctx.touch();
            ctx.notes.len()
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::Notes {
            mission_id: mission_id.to_string(),
            note_count,
        });
        Ok(())
    }

    /// Files a note's source into the mission's generated document group.
    ///
    /// Web notes with fetched full content become new documents: the id
    /// is derived from the source URL (UUIDv5 in the URL namespace) so
    /// the same page fetched twice maps to the same document. Notes cut
    /// from library documents add the referenced document to the group.
    /// Notes marked irrelevant are skipped. Each source is processed at
    /// most once per mission.
    pub async fn process_note_for_group(
        &self,
        mission_id: &str,
        note: &Note,
        user_id: &str,
        group_id: &str,
    ) -> Result<Option<String>> {
        if !note.is_relevant {
            return Ok(None);
        }
        let Some(meta) = &note.source_metadata else {
            return Ok(None);
        };

        if note.source_type == NoteSourceType::Document {
            let Some(doc_id) = &meta.doc_id else {
                return Ok(None);
            };
            {
                let mut processed = self.processed_sources.write();
                let seen = processed.entry(mission_id.to_string()).or_default();
                if !seen.insert(doc_id.clone()) {
                    return Ok(None);
                }
            }
            self.store.add_document_to_group(group_id, doc_id).await?;
            return Ok(Some(doc_id.clone()));
        }

        if note.source_type != NoteSourceType::Web {
            return Ok(None);
        }
        if !meta.fetched_full_content {
            return Ok(None);
        }
        let Some(url) = &meta.url else {
            return Ok(None);
        };
        let Some(full_text) = &meta.full_text else {
            return Ok(None);
        };

        {
            let mut processed = self.processed_sources.write();
            let seen = processed.entry(mission_id.to_string()).or_default();
            if !seen.insert(url.clone()) {
                return Ok(None);
            }
        }

        let doc_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string();

        if self.store.get_document(&doc_id).await?.is_none() {
            let docs_dir = self.data_dir.join("generated_docs");
            tokio::fs::create_dir_all(&docs_dir)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create docs dir: {}", e)))?;

            let filename = format!("{}.md", doc_id);
            let file_path = docs_dir.join(&filename);
            tokio::fs::write(&file_path, full_text.as_bytes())
                .await
                .map_err(|e| AppError::Internal(format!("Failed to write document file: {}", e)))?;

            let title = meta.title.clone().unwrap_or_else(|| url.clone());
            self.store
                .create_document(&crate::db::DocumentRow {
                    id: doc_id.clone(),
                    user_id: user_id.to_string(),
                    filename,
                    original_filename: title.clone(),
                    file_path: file_path.to_string_lossy().into_owned(),
                    processing_status: "pending".to_string(),
                    metadata: Some(serde_json::json!({
                        "source_url": url,
                        "title": title,
                        "mission_id": mission_id,
                    })),
                })
                .await?;
        }

        self.store.add_document_to_group(group_id, &doc_id).await?;
        Ok(Some(doc_id))
    }

    // ============= Pads and scratchpad =============

    pub async fn add_goal(&self, mission_id: &str, goal: GoalEntry) -> Result<()> {
        let goals = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.goal_pad.push(goal);
            ctx.touch();
            serde_json::to_value(&ctx.goal_pad).unwrap_or_default()
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::GoalPad {
            mission_id: mission_id.to_string(),
            goals,
        });
        Ok(())
    }

    pub async fn update_goal_status(
        &self,
        mission_id: &str,
        goal_id: &str,
        status: GoalStatus,
    ) -> Result<()> {
        let goals = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            let goal = ctx
                .goal_pad
                .iter_mut()
                .find(|g| g.goal_id == goal_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Goal {} not found in mission {}", goal_id, mission_id))
                })?;
            goal.status = status;
            ctx.touch();
            serde_json::to_value(&ctx.goal_pad).unwrap_or_default()
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::GoalPad {
            mission_id: mission_id.to_string(),
            goals,
        });
        Ok(())
    }

    pub async fn update_goal_text(&self, mission_id: &str, goal_id: &str, text: String) -> Result<()> {
        let goals = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            let goal = ctx
                .goal_pad
                .iter_mut()
                .find(|g| g.goal_id == goal_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Goal {} not found in mission {}", goal_id, mission_id))
                })?;
            goal.text = text;
            ctx.touch();
            serde_json::to_value(&ctx.goal_pad).unwrap_or_default()
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::GoalPad {
            mission_id: mission_id.to_string(),
            goals,
        });
        Ok(())
    }

    pub fn active_goals(&self, mission_id: &str) -> Result<Vec<GoalEntry>> {
        let contexts = self.contexts.read();
        let ctx = contexts
            .get(mission_id)
            .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
        Ok(ctx
            .goal_pad
            .iter()
            .filter(|g| g.status == GoalStatus::Active)
            .cloned()
            .collect())
    }

    /// Returns the most recent thoughts, oldest first. Defaults to five.
    pub fn recent_thoughts(&self, mission_id: &str, limit: Option<usize>) -> Result<Vec<ThoughtEntry>> {
        let limit = limit.unwrap_or(5);
        let contexts = self.contexts.read();
        let ctx = contexts
            .get(mission_id)
            .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
        let start = ctx.thought_pad.len().saturating_sub(limit);
        Ok(ctx.thought_pad[start..].to_vec())
    }

    pub async fn add_thought(&self, mission_id: &str, thought: ThoughtEntry) -> Result<()> {
        let thoughts = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.thought_pad.push(thought);
            if ctx.thought_pad.len() > MAX_THOUGHT_PAD_ENTRIES {
                let excess = ctx.thought_pad.len() - MAX_THOUGHT_PAD_ENTRIES;
                ctx.thought_pad.drain(..excess);
            }
            ctx.touch();
            serde_json::to_value(&ctx.thought_pad).unwrap_or_default()
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::ThoughtPad {
            mission_id: mission_id.to_string(),
            thoughts,
        });
        Ok(())
    }

    /// Updates the shared scratchpad. Unchanged content is a no-op with
    /// no persistence or broadcast.
    pub async fn update_scratchpad(&self, mission_id: &str, content: Option<String>) -> Result<()> {
        let changed = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            if ctx.agent_scratchpad == content {
                false
            } else {
                ctx.agent_scratchpad = content.clone();
                ctx.touch();
                true
            }
        };

        if changed {
            self.persist_context(mission_id).await;
            self.bus.publish(MissionEvent::Scratchpad {
                mission_id: mission_id.to_string(),
                content,
            });
        }
        Ok(())
    }

    pub async fn add_writing_suggestion(&self, mission_id: &str, suggestion: String) -> Result<()> {
        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.writing_suggestions.push(suggestion);
            ctx.touch();
        }
        self.persist_context(mission_id).await;
        Ok(())
    }

    // ============= Execution log =============

    /// Appends an execution log entry, persists it, and broadcasts it.
    ///
    /// While a mission is paused or stopped, agent activity is suppressed
    /// so stale in-flight work cannot pollute the log. The lifecycle
    /// actions themselves are always recorded.
    pub async fn log_execution_step(&self, mission_id: &str, mut entry: ExecutionLogEntry) -> Result<bool> {
        let suppressed = {
            let contexts = self.contexts.read();
            let ctx = contexts
                .get(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            matches!(ctx.status, MissionStatus::Paused | MissionStatus::Stopped)
                && !matches!(
                    entry.action.as_str(),
                    "Pause Mission" | "Stop Mission" | "Resume Mission"
                )
        };
        if suppressed {
            tracing::debug!(mission_id = %mission_id, action = %entry.action, "Suppressing log entry for inactive mission");
            return Ok(false);
        }

        if let Some(details) = &entry.model_details {
            if entry.cost.is_none() {
                entry.cost = extract_f64(details, &["cost", "total_cost"]);
            }
            if entry.prompt_tokens.is_none() {
                entry.prompt_tokens = extract_i64(details, &["prompt_tokens"]);
            }
            if entry.completion_tokens.is_none() {
                entry.completion_tokens = extract_i64(details, &["completion_tokens"]);
            }
            if entry.native_tokens.is_none() {
                entry.native_tokens =
                    extract_i64(details, &["native_total_tokens", "total_tokens"]);
            }
        }

        {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.execution_log.push(entry.clone());
            ctx.touch();
        }

        if let Err(e) = self
            .store
            .create_execution_log(
                &entry.log_id,
                mission_id,
                entry.timestamp,
                &entry.agent_name,
                &entry.action,
                entry.input_summary.as_deref(),
                entry.output_summary.as_deref(),
                entry.status,
                entry.error_message.as_deref(),
                entry.full_input.as_ref(),
                entry.full_output.as_ref(),
                entry.model_details.as_ref(),
                entry.tool_calls.as_ref(),
                if entry.file_interactions.is_empty() {
                    None
                } else {
                    Some(&entry.file_interactions)
                },
                entry.cost,
                entry.prompt_tokens,
                entry.completion_tokens,
                entry.native_tokens,
            )
            .await
        {
            tracing::error!(mission_id = %mission_id, error = %e, "Failed to persist execution log entry");
        }
        self.persist_context(mission_id).await;

        if let Some(details) = entry.model_details.clone() {
            self.update_mission_stats(mission_id, &details).await?;
        }

        self.bus.publish(MissionEvent::Logs {
            mission_id: mission_id.to_string(),
            entry: serde_json::to_value(&entry).unwrap_or_default(),
        });
        Ok(true)
    }

    // ============= Stats =============

    /// Folds one model call's usage into the mission totals.
    ///
    /// Calls are deduplicated by call id; when the provider reports no
    /// id, one is synthesized from the model name, timestamp, and
    /// duration so an identical retry still counts once. Native token
    /// counts only contribute when prompt and completion counts are
    /// absent, otherwise the native total mirrors prompt + completion.
    pub async fn update_mission_stats(
        &self,
        mission_id: &str,
        model_details: &serde_json::Value,
    ) -> Result<()> {
        let call_id = model_details
            .get("call_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                let model = model_details
                    .get("model_name")
                    .or_else(|| model_details.get("model"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                let timestamp = model_details
                    .get("timestamp")
                    .and_then(|v| v.as_str())
                    .unwrap_or("0");
                let duration = model_details
                    .get("duration_sec")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                format!("{}_{}_{}", model, timestamp, duration)
            });

        let cost = extract_f64(model_details, &["cost", "total_cost"]).unwrap_or(0.0);
        let prompt = extract_i64(model_details, &["prompt_tokens"]).unwrap_or(0);
        let completion = extract_i64(model_details, &["completion_tokens"]).unwrap_or(0);
        let native =
            extract_i64(model_details, &["native_total_tokens", "total_tokens"]).unwrap_or(0);

        // A call reporting no usage at all is not counted; its id stays
        // untracked so a later retry that does carry usage still counts.
        if cost == 0.0 && prompt == 0 && completion == 0 && native == 0 {
            return Ok(());
        }

        let stats = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;

            if ctx.stats.counted_call_ids.contains(&call_id) {
                tracing::debug!(mission_id = %mission_id, call_id = %call_id, "Skipping duplicate stats update");
                return Ok(());
            }
            ctx.stats.counted_call_ids.insert(call_id);

            ctx.stats.total_cost += cost;
            ctx.stats.total_prompt_tokens += prompt;
            ctx.stats.total_completion_tokens += completion;
            if prompt == 0 && completion == 0 {
                ctx.stats.total_native_tokens += native;
            } else {
                // Prompt and completion counts are canonical; the native
                // total is reconciled to them, not accumulated alongside.
                ctx.stats.total_native_tokens =
                    ctx.stats.total_prompt_tokens + ctx.stats.total_completion_tokens;
            }
            ctx.touch();
            serde_json::to_value(&ctx.stats).unwrap_or_default()
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::Stats {
            mission_id: mission_id.to_string(),
            stats,
        });
        Ok(())
    }

    /// Counts one web search call against the mission at the flat
    /// per-call cost.
    pub async fn increment_web_search_count(&self, mission_id: &str) -> Result<()> {
        let stats = {
            let mut contexts = self.contexts.write();
            let ctx = contexts
                .get_mut(mission_id)
                .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
            ctx.stats.total_web_search_calls += 1;
            ctx.stats.total_cost += self.research.web_search_cost_per_call;
            ctx.touch();
            serde_json::to_value(&ctx.stats).unwrap_or_default()
        };

        self.persist_context(mission_id).await;
        self.bus.publish(MissionEvent::Stats {
            mission_id: mission_id.to_string(),
            stats,
        });
        Ok(())
    }

    // ============= Metadata =============

    pub fn set_metadata_value(
        &self,
        mission_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut contexts = self.contexts.write();
        let ctx = contexts
            .get_mut(mission_id)
            .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
        ctx.metadata.insert(key.to_string(), value);
        ctx.touch();
        Ok(())
    }

    // ============= Persistence =============

    /// Persists the current context snapshot. Failures are logged, not
    /// propagated: in-memory state stays the source of truth and the next
    /// successful persist catches up.
    pub async fn persist_context(&self, mission_id: &str) {
        let snapshot = self.contexts.read().get(mission_id).cloned();
        let Some(ctx) = snapshot else { return };

        let value = match serde_json::to_value(&ctx) {
            Ok(v) => sanitize_json(v),
            Err(e) => {
                tracing::error!(mission_id = %mission_id, error = %e, "Failed to serialize mission context");
                return;
            }
        };

        if let Err(e) = self.store.update_mission_context(mission_id, &value).await {
            tracing::error!(mission_id = %mission_id, error = %e, "Failed to persist mission context");
        }
    }
}

fn extract_f64(value: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| value.get(k).and_then(|v| v.as_f64()))
}

fn extract_i64(value: &serde_json::Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| value.get(k).and_then(|v| v.as_i64()))
}

fn collect_section_ids(sections: &[ReportSection]) -> Vec<String> {
    let mut ids = Vec::new();
    for section in sections {
        ids.push(section.section_id.clone());
        ids.extend(collect_section_ids(&section.subsections));
    }
    ids
}

/// Assembles the current report draft from the outline and whatever
/// section content exists so far. Sections are numbered hierarchically;
/// a section without content gets an explicit placeholder.
pub fn build_draft(ctx: &MissionContext) -> String {
    let Some(plan) = &ctx.plan else {
        return String::new();
    };

    let mut draft = String::new();
    draft.push_str(&format!("# {}\n", plan.mission_goal));
    render_sections(&plan.report_outline, &ctx.report_content, &mut Vec::new(), &mut draft);
    draft
}

fn render_sections(
    sections: &[ReportSection],
    content: &HashMap<String, String>,
    numbering: &mut Vec<usize>,
    out: &mut String,
) {
    for (i, section) in sections.iter().enumerate() {
        numbering.push(i + 1);
        let number: Vec<String> = numbering.iter().map(|n| n.to_string()).collect();
        let heading_level = (numbering.len() + 1).min(6);

        out.push('\n');
        out.push_str(&"#".repeat(heading_level));
        out.push_str(&format!(" {}. {}\n\n", number.join("."), section.title));

        match content.get(&section.section_id) {
            Some(body) => {
                out.push_str(body);
                out.push('\n');
            }
            None => {
                out.push_str(&format!("[Content missing for section {}]\n", section.section_id));
            }
        }

        render_sections(&section.subsections, content, numbering, out);
        numbering.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{Plan, ReportSection};

    fn sample_context_with_plan() -> MissionContext {
        let mut ctx = MissionContext::new("m1", "survey of rust web frameworks");
        ctx.plan = Some(Plan {
            mission_goal: "Survey of Rust Web Frameworks".to_string(),
            report_outline: vec![
                ReportSection::new("intro", "Introduction")
                    .with_subsections(vec![ReportSection::new("background", "Background")]),
                ReportSection::new("conclusion", "Conclusion"),
            ],
            research_sections: Vec::new(),
        });
        ctx
    }

    #[test]
    fn draft_numbers_sections_hierarchically() {
        let mut ctx = sample_context_with_plan();
        ctx.report_content
            .insert("intro".to_string(), "Opening words.".to_string());

        let draft = build_draft(&ctx);
        assert!(draft.starts_with("# Survey of Rust Web Frameworks\n"));
        assert!(draft.contains("## 1. Introduction"));
        assert!(draft.contains("Opening words."));
        assert!(draft.contains("### 1.1. Background"));
        assert!(draft.contains("[Content missing for section background]"));
        assert!(draft.contains("## 2. Conclusion"));
        assert!(draft.contains("[Content missing for section conclusion]"));
    }

    #[test]
    fn draft_is_empty_without_a_plan() {
        let ctx = MissionContext::new("m1", "anything");
        assert_eq!(build_draft(&ctx), "");
    }

    #[test]
    fn section_ids_are_collected_depth_first() {
        let ctx = sample_context_with_plan();
        let ids = collect_section_ids(&ctx.plan.as_ref().unwrap().report_outline);
        assert_eq!(ids, vec!["intro", "background", "conclusion"]);
    }
}
