//! API integration tests
//!
//! Full-stack tests over the Axum router using `axum_test::TestServer`
//! and in-memory SQLite.

use axum_test::TestServer;
use maestro::auth::jwt::AuthService;
use maestro::config::{
    AuthConfig, Config, DatabaseConfig, ProviderConfig, ResearchConfig, ServerConfig,
};
use maestro::db::Store;
use maestro::events::UpdateBus;
use maestro::missions::{ContextManager, MissionService};
use maestro::AppState;
use serde_json::json;
use std::sync::Arc;

fn test_config(data_dir: std::path::PathBuf) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            path: ":memory:".to_string(),
            data_dir,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret-key-that-is-at-least-32-chars".to_string(),
            jwt_access_expiry: 900,
            jwt_refresh_expiry: 604800,
            admin_username: "admin".to_string(),
            admin_password: "pass123".to_string(),
        },
        research: ResearchConfig {
            writing_agent_max_context_chars: 300_000,
            main_research_doc_results: 5,
            main_research_web_results: 5,
            max_concurrent_requests: 10,
            web_search_cost_per_call: 0.005,
        },
        provider: ProviderConfig {
            base_url: "https://api.openai.com/v1/".to_string(),
            api_key: None,
        },
    }
}

async fn create_test_server(data_dir: std::path::PathBuf) -> (TestServer, AppState) {
    let config = test_config(data_dir.clone());
    let store = Arc::new(Store::new_memory().await.expect("in-memory store"));

    let auth_service = Arc::new(AuthService::new(
        config.auth.jwt_secret.clone(),
        config.auth.jwt_access_expiry,
        config.auth.jwt_refresh_expiry,
    ));
    let password_hash = auth_service.hash_password("pass123").unwrap();
    store
        .create_user("user-1", "admin", &password_hash)
        .await
        .unwrap();
    store.create_chat("chat-1", "user-1", None).await.unwrap();

    let bus = UpdateBus::new();
    let manager = Arc::new(ContextManager::new(
        store.clone(),
        bus.clone(),
        config.research.clone(),
        data_dir,
    ));
    let mission_service = Arc::new(MissionService::new(
        store.clone(),
        manager.clone(),
        config.clone(),
    ));

    let state = AppState {
        config: Arc::new(config),
        store,
        manager,
        mission_service,
        bus,
        auth_service: auth_service.clone(),
    };

    let app = axum::Router::new()
        .nest("/api", maestro::api::routes::create_router(auth_service))
        .with_state(state.clone());

    (TestServer::new(app).expect("test server"), state)
}

async fn login(server: &TestServer) -> String {
    let response = server
        .post("/api/auth/login")
        .json(&json!({"username": "admin", "password": "pass123"}))
        .await;
    response.assert_status_ok();
    response.json::<serde_json::Value>()["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _state) = create_test_server(dir.path().to_path_buf()).await;

    let response = server.get("/api/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "ok");
}

#[tokio::test]
async fn test_missions_require_auth() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _state) = create_test_server(dir.path().to_path_buf()).await;

    let response = server
        .post("/api/missions")
        .json(&json!({"user_request": "anything", "chat_id": "chat-1"}))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _state) = create_test_server(dir.path().to_path_buf()).await;

    let response = server
        .post("/api/auth/login")
        .json(&json!({"username": "admin", "password": "wrong"}))
        .await;
    response.assert_status_unauthorized();

    let response = server
        .post("/api/auth/login")
        .json(&json!({"username": "ghost", "password": "pass123"}))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_token_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _state) = create_test_server(dir.path().to_path_buf()).await;

    let response = server
        .post("/api/auth/login")
        .json(&json!({"username": "admin", "password": "pass123"}))
        .await;
    response.assert_status_ok();
    let refresh = response.json::<serde_json::Value>()["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post("/api/auth/refresh")
        .json(&json!({"refresh_token": refresh}))
        .await;
    response.assert_status_ok();
    assert!(response.json::<serde_json::Value>()["access_token"].is_string());

    let response = server
        .post("/api/auth/refresh")
        .json(&json!({"refresh_token": "garbage"}))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_start_mission_flow() {
    let dir = tempfile::tempdir().unwrap();
    let (server, state) = create_test_server(dir.path().to_path_buf()).await;
    let token = login(&server).await;

    let response = server
        .post("/api/missions")
        .authorization_bearer(&token)
        .json(&json!({
            "user_request": "compare rust web frameworks",
            "chat_id": "chat-1",
            "auto_create_document_group": true,
        }))
        .await;
    response.assert_status_ok();

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["status"], "planning");
    assert_eq!(body["execution_phase"], "not_started");
    let mission_id = body["mission_id"].as_str().unwrap();

    // Group was created for saving, not searching.
    let ctx = state.manager.get_context(mission_id).unwrap();
    assert!(ctx.metadata.contains_key("generated_document_group_id"));
    assert_eq!(ctx.metadata["tool_selection"]["local_rag"], false);
    assert_eq!(ctx.metadata["tool_selection"]["web_search"], true);
    assert_eq!(ctx.execution_log[0].action, "Document Group Created");

    let response = server
        .get(&format!("/api/missions/{}", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_start_mission_rejects_empty_request() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _state) = create_test_server(dir.path().to_path_buf()).await;
    let token = login(&server).await;

    let response = server
        .post("/api/missions")
        .authorization_bearer(&token)
        .json(&json!({"user_request": "   ", "chat_id": "chat-1"}))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_start_mission_unknown_group_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _state) = create_test_server(dir.path().to_path_buf()).await;
    let token = login(&server).await;

    let response = server
        .post("/api/missions")
        .authorization_bearer(&token)
        .json(&json!({
            "user_request": "anything",
            "chat_id": "chat-1",
            "document_group_id": "no-such-group",
        }))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let (server, state) = create_test_server(dir.path().to_path_buf()).await;
    let token = login(&server).await;

    let response = server
        .post("/api/missions")
        .authorization_bearer(&token)
        .json(&json!({"user_request": "req", "chat_id": "chat-1"}))
        .await;
    response.assert_status_ok();
    let mission_id = response.json::<serde_json::Value>()["mission_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Pausing a planning mission is rejected.
    let response = server
        .post(&format!("/api/missions/{}/pause", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);

    state
        .manager
        .update_status(&mission_id, maestro::types::MissionStatus::Running, None)
        .await
        .unwrap();

    let response = server
        .post(&format!("/api/missions/{}/pause", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "paused");

    let response = server
        .post(&format!("/api/missions/{}/resume", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["status"], "running");
    // Resume re-enters the first uncompleted phase.
    assert_eq!(body["execution_phase"], "initial_analysis");

    let response = server
        .post(&format!("/api/missions/{}/stop", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "stopped");

    // The lifecycle actions were recorded even while inactive.
    let logs = state.manager.get_context(&mission_id).unwrap().execution_log;
    let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
    assert_eq!(actions, vec!["Pause Mission", "Resume Mission", "Stop Mission"]);
}

#[tokio::test]
async fn test_stats_and_checkpoint_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let (server, state) = create_test_server(dir.path().to_path_buf()).await;
    let token = login(&server).await;

    let response = server
        .post("/api/missions")
        .authorization_bearer(&token)
        .json(&json!({"user_request": "req", "chat_id": "chat-1"}))
        .await;
    let mission_id = response.json::<serde_json::Value>()["mission_id"]
        .as_str()
        .unwrap()
        .to_string();

    state
        .manager
        .update_mission_stats(
            &mission_id,
            &json!({"call_id": "c1", "cost": 0.05, "prompt_tokens": 10, "completion_tokens": 5}),
        )
        .await
        .unwrap();

    let response = server
        .get(&format!("/api/missions/{}/stats", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let stats = response.json::<serde_json::Value>();
    assert_eq!(stats["total_prompt_tokens"], 10);
    assert_eq!(stats["total_native_tokens"], 15);

    let response = server
        .get(&format!("/api/missions/{}/checkpoint", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let checkpoint = response.json::<serde_json::Value>();
    assert_eq!(checkpoint["resume_phase"], "initial_analysis");
    assert_eq!(checkpoint["has_plan"], false);

    // Unknown mission id on any sub-resource is a 404.
    let response = server
        .get("/api/missions/no-such-mission/stats")
        .authorization_bearer(&token)
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_report_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let (server, state) = create_test_server(dir.path().to_path_buf()).await;
    let token = login(&server).await;

    let response = server
        .post("/api/missions")
        .authorization_bearer(&token)
        .json(&json!({"user_request": "req", "chat_id": "chat-1"}))
        .await;
    let mission_id = response.json::<serde_json::Value>()["mission_id"]
        .as_str()
        .unwrap()
        .to_string();

    // No report yet.
    let response = server
        .get(&format!("/api/missions/{}/report", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_not_found();

    state
        .manager
        .store_final_report(&mission_id, "# The Answer\n\nDetails.")
        .await
        .unwrap();

    let response = server
        .get(&format!("/api/missions/{}/report", mission_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let report = response.json::<serde_json::Value>();
    assert_eq!(report["version"], 1);
    assert_eq!(report["title"], "The Answer");
}
