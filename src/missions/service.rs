//! Mission preparation.
//!
//! Everything that has to happen between "user asked for research" and
//! "mission is ready to plan": tool selection, document group wiring, and
//! the settings snapshot recorded into mission metadata.

use crate::config::Config;
use crate::db::Store;
use crate::missions::context::{ExecutionLogEntry, MissionContext};
use crate::missions::manager::ContextManager;
use crate::types::{AppError, LogStatus, Result, StartMissionRequest};
use crate::utils::group_title;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct MissionService {
    store: Arc<Store>,
    manager: Arc<ContextManager>,
    config: Config,
}

impl MissionService {
    pub fn new(store: Arc<Store>, manager: Arc<ContextManager>, config: Config) -> Self {
        Self {
            store,
            manager,
            config,
        }
    }

    /// Creates a mission and wires it up for execution.
    ///
    /// Tool selection: web search follows the request flag; local document
    /// search is enabled only when the user picked a group to search.
    /// Auto-created groups are for SAVING documents gathered during the
    /// mission; they never enable local search and never replace the
    /// user's search group.
    pub async fn prepare_mission_start(
        &self,
        user_id: &str,
        request: &StartMissionRequest,
    ) -> Result<MissionContext> {
        if request.user_request.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "user_request must not be empty".to_string(),
            ));
        }

        if let Some(group_id) = &request.document_group_id {
            if !self.store.document_group_exists(group_id).await? {
                return Err(AppError::NotFound(format!(
                    "Document group {} not found",
                    group_id
                )));
            }
        }

        if self.store.get_chat(&request.chat_id).await?.is_none() {
            self.store
                .create_chat(&request.chat_id, user_id, Some(&request.user_request))
                .await?;
        }

        let ctx = self
            .manager
            .start_mission(&request.chat_id, &request.user_request)
            .await?;
        let mission_id = ctx.mission_id.clone();

        // Group creation failures are logged and tolerated: the mission
        // runs without auto-save rather than failing to start.
        let generated_group_id = if request.auto_create_document_group {
            match self.create_generated_group(&mission_id, user_id, &request.user_request).await {
                Ok(group_id) => Some(group_id),
                Err(e) => {
                    tracing::warn!(mission_id = %mission_id, error = %e, "Failed to create generated document group");
                    None
                }
            }
        } else {
            None
        };

        let tool_selection = serde_json::json!({
            "web_search": request.use_web_search,
            "local_rag": request.document_group_id.is_some(),
        });

        // Settings are frozen at start so a mid-mission settings change
        // cannot alter a running mission.
        let comprehensive_settings = serde_json::json!({
            "tool_selection": tool_selection,
            "writing_agent_max_context_chars": self.config.research.writing_agent_max_context_chars,
            "main_research_doc_results": self.config.research.main_research_doc_results,
            "main_research_web_results": self.config.research.main_research_web_results,
            "max_concurrent_requests": self.config.research.max_concurrent_requests,
            "provider_base_url": self.config.provider.base_url,
            "research_params": request.research_params,
        });

        self.manager.set_metadata_value(
            &mission_id,
            "user_id",
            serde_json::Value::String(user_id.to_string()),
        )?;
        self.manager
            .set_metadata_value(&mission_id, "tool_selection", tool_selection)?;
        self.manager.set_metadata_value(
            &mission_id,
            "comprehensive_settings",
            comprehensive_settings,
        )?;
        self.manager.set_metadata_value(
            &mission_id,
            "use_web_search",
            serde_json::Value::Bool(request.use_web_search),
        )?;
        if let Some(group_id) = &request.document_group_id {
            self.manager.set_metadata_value(
                &mission_id,
                "document_group_id",
                serde_json::Value::String(group_id.clone()),
            )?;
        }
        if let Some(group_id) = &generated_group_id {
            self.manager.set_metadata_value(
                &mission_id,
                "generated_document_group_id",
                serde_json::Value::String(group_id.clone()),
            )?;
        }
        self.manager.persist_context(&mission_id).await;

        self.manager
            .get_context(&mission_id)
            .ok_or_else(|| AppError::Internal("Mission vanished during preparation".to_string()))
    }

    async fn create_generated_group(
        &self,
        mission_id: &str,
        user_id: &str,
        user_request: &str,
    ) -> Result<String> {
        let group_id = Uuid::new_v4().to_string();
        let name = group_title(user_request);
        self.store
            .create_document_group(
                &group_id,
                user_id,
                &name,
                Some("Documents gathered during research"),
            )
            .await?;
        self.store
            .set_generated_document_group(mission_id, &group_id)
            .await?;

        self.manager
            .log_execution_step(
                mission_id,
                ExecutionLogEntry {
                    log_id: Uuid::new_v4().to_string(),
                    timestamp: Utc::now(),
                    agent_name: "System".to_string(),
                    action: "Document Group Created".to_string(),
                    input_summary: None,
                    output_summary: Some(format!("Created document group '{}' for gathered sources", name)),
                    status: LogStatus::Success,
                    error_message: None,
                    full_input: None,
                    full_output: None,
                    model_details: None,
                    tool_calls: None,
                    file_interactions: Vec::new(),
                    cost: None,
                    prompt_tokens: None,
                    completion_tokens: None,
                    native_tokens: None,
                },
            )
            .await?;

        Ok(group_id)
    }
}
