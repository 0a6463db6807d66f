use crate::auth::middleware::AuthUser;
use crate::missions::context::ExecutionLogEntry;
use crate::missions::phases::ExecutionPhase;
use crate::types::{
    AppError, LogStatus, MissionResponse, MissionStatsResponse, MissionStatus, Result,
    StartMissionRequest,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

/// Start a new research mission
#[utoipa::path(
    post,
    path = "/api/missions",
    request_body = StartMissionRequest,
    responses(
        (status = 200, description = "Mission created", body = MissionResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Document group not found")
    ),
    tag = "missions"
)]
pub async fn start_mission(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<StartMissionRequest>,
) -> Result<Json<MissionResponse>> {
    let ctx = state
        .mission_service
        .prepare_mission_start(&claims.sub, &payload)
        .await?;

    Ok(Json(mission_response(&ctx)))
}

/// Get mission status and metadata
#[utoipa::path(
    get,
    path = "/api/missions/{id}",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Mission found", body = MissionResponse),
        (status = 404, description = "Mission not found")
    ),
    tag = "missions"
)]
pub async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MissionResponse>> {
    let ctx = state
        .manager
        .get_context(&id)
        .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", id)))?;

    Ok(Json(mission_response(&ctx)))
}

/// Pause a running mission
#[utoipa::path(
    post,
    path = "/api/missions/{id}/pause",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Mission paused", body = MissionResponse),
        (status = 404, description = "Mission not found"),
        (status = 409, description = "Mission is not running")
    ),
    tag = "missions"
)]
pub async fn pause_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MissionResponse>> {
    transition(&state, &id, MissionStatus::Paused, "Pause Mission").await
}

/// Resume a paused or stopped mission
#[utoipa::path(
    post,
    path = "/api/missions/{id}/resume",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Mission resumed", body = MissionResponse),
        (status = 404, description = "Mission not found"),
        (status = 409, description = "Mission cannot be resumed")
    ),
    tag = "missions"
)]
pub async fn resume_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MissionResponse>> {
    transition(&state, &id, MissionStatus::Running, "Resume Mission").await
}

/// Stop a mission
#[utoipa::path(
    post,
    path = "/api/missions/{id}/stop",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Mission stopped", body = MissionResponse),
        (status = 404, description = "Mission not found"),
        (status = 409, description = "Mission already finished")
    ),
    tag = "missions"
)]
pub async fn stop_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MissionResponse>> {
    transition(&state, &id, MissionStatus::Stopped, "Stop Mission").await
}

/// Applies a lifecycle transition, rejecting moves the state machine
/// does not allow, and records the action in the execution log.
async fn transition(
    state: &AppState,
    mission_id: &str,
    target: MissionStatus,
    action: &str,
) -> Result<Json<MissionResponse>> {
    let ctx = state
        .manager
        .get_context(mission_id)
        .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;

    let allowed = match target {
        MissionStatus::Paused => ctx.status == MissionStatus::Running,
        MissionStatus::Running => {
            matches!(ctx.status, MissionStatus::Paused | MissionStatus::Stopped)
        }
        MissionStatus::Stopped => matches!(
            ctx.status,
            MissionStatus::Planning | MissionStatus::Running | MissionStatus::Paused
        ),
        _ => false,
    };
    if !allowed {
        return Err(AppError::MissionState(format!(
            "Cannot transition mission {} from {} to {}",
            mission_id, ctx.status, target
        )));
    }

    state.manager.update_status(mission_id, target, None).await?;

    // A resumed mission re-enters the phase the checkpoint state selects.
    if action == "Resume Mission" {
        let resume_phase = state.manager.get_resume_checkpoint(mission_id)?.resume_phase;
        state.manager.set_phase(mission_id, resume_phase).await?;
    }

    // Lifecycle actions are recorded even while paused or stopped.
    state
        .manager
        .log_execution_step(
            mission_id,
            ExecutionLogEntry {
                log_id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                agent_name: "system".to_string(),
                action: action.to_string(),
                input_summary: None,
                output_summary: Some(format!("Mission status set to {}", target)),
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

    let ctx = state
        .manager
        .get_context(mission_id)
        .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;
    Ok(Json(mission_response(&ctx)))
}

/// Get the current report draft
#[utoipa::path(
    get,
    path = "/api/missions/{id}/draft",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Current draft"),
        (status = 404, description = "Mission not found")
    ),
    tag = "missions"
)]
pub async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let draft = state.manager.build_draft_from_context(&id)?;
    Ok(Json(serde_json::json!({
        "mission_id": id,
        "draft": draft,
    })))
}

/// Get gathered research notes
#[utoipa::path(
    get,
    path = "/api/missions/{id}/notes",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Research notes"),
        (status = 404, description = "Mission not found")
    ),
    tag = "missions"
)]
pub async fn get_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let ctx = state
        .manager
        .get_context(&id)
        .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", id)))?;

    Ok(Json(serde_json::json!({
        "mission_id": id,
        "notes": ctx.notes,
    })))
}

/// Get the execution log
#[utoipa::path(
    get,
    path = "/api/missions/{id}/logs",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Execution log entries"),
        (status = 404, description = "Mission not found")
    ),
    tag = "missions"
)]
pub async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let ctx = state
        .manager
        .get_context(&id)
        .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", id)))?;

    Ok(Json(serde_json::json!({
        "mission_id": id,
        "entries": ctx.execution_log,
    })))
}

/// Get cost and token totals
#[utoipa::path(
    get,
    path = "/api/missions/{id}/stats",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Mission statistics", body = MissionStatsResponse),
        (status = 404, description = "Mission not found")
    ),
    tag = "missions"
)]
pub async fn get_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MissionStatsResponse>> {
    let ctx = state
        .manager
        .get_context(&id)
        .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", id)))?;

    Ok(Json(MissionStatsResponse {
        mission_id: id,
        total_cost: ctx.stats.total_cost,
        total_prompt_tokens: ctx.stats.total_prompt_tokens.max(0) as u64,
        total_completion_tokens: ctx.stats.total_completion_tokens.max(0) as u64,
        total_native_tokens: ctx.stats.total_native_tokens.max(0) as u64,
        total_web_searches: ctx.stats.total_web_search_calls,
    }))
}

/// Get the current final report version
#[utoipa::path(
    get,
    path = "/api/missions/{id}/report",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Current report version"),
        (status = 404, description = "No report yet")
    ),
    tag = "missions"
)]
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let report = state
        .store
        .get_current_report(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No report for mission {}", id)))?;

    Ok(Json(serde_json::json!({
        "mission_id": report.mission_id,
        "version": report.version,
        "title": report.title,
        "content": report.content,
        "revision_notes": report.revision_notes,
    })))
}

/// Get the resume checkpoint summary
#[utoipa::path(
    get,
    path = "/api/missions/{id}/checkpoint",
    params(("id" = String, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Resume checkpoint"),
        (status = 404, description = "Mission not found")
    ),
    tag = "missions"
)]
pub async fn get_checkpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let checkpoint = state.manager.get_resume_checkpoint(&id)?;
    Ok(Json(serde_json::to_value(checkpoint)?))
}

fn mission_response(ctx: &crate::missions::context::MissionContext) -> MissionResponse {
    MissionResponse {
        mission_id: ctx.mission_id.clone(),
        status: ctx.status,
        user_request: ctx.user_request.clone(),
        execution_phase: ctx
            .current_phase
            .unwrap_or(ExecutionPhase::NotStarted)
            .as_str()
            .to_string(),
        created_at: ctx.created_at,
        updated_at: ctx.updated_at,
        error_info: ctx.error_info.clone(),
    }
}
