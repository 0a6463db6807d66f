//! Database integration tests
//!
//! These tests verify the Store functionality using in-memory SQLite.

use chrono::Utc;
use maestro::db::{DocumentRow, Store};
use maestro::types::{LogStatus, MissionStatus};

/// Test helper to create a Store with in-memory database
async fn create_test_store() -> Store {
    Store::new_memory()
        .await
        .expect("Failed to create in-memory database")
}

#[tokio::test]
async fn test_create_memory_store() {
    let store = create_test_store().await;
    assert!(store.connection().is_ok());
}

#[tokio::test]
async fn test_create_and_fetch_user() {
    let store = create_test_store().await;

    store
        .create_user("user-1", "admin", "$argon2id$fake-hash")
        .await
        .expect("should create user");

    let user = store
        .get_user_by_username("admin")
        .await
        .expect("should query user")
        .expect("user should exist");
    assert_eq!(user.id, "user-1");
    assert_eq!(user.password_hash, "$argon2id$fake-hash");

    let missing = store
        .get_user_by_username("nobody")
        .await
        .expect("should query user");
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let store = create_test_store().await;

    store
        .create_user("user-1", "admin", "hash")
        .await
        .expect("should create user");
    let result = store.create_user("user-2", "admin", "hash").await;
    assert!(result.is_err(), "duplicate username should be rejected");
}

#[tokio::test]
async fn test_mission_crud() {
    let store = create_test_store().await;
    store.create_user("user-1", "admin", "hash").await.unwrap();
    store
        .create_chat("chat-1", "user-1", Some("research chat"))
        .await
        .unwrap();

    let ctx = serde_json::json!({"notes": [], "status": "planning"});
    store
        .create_mission("mission-1", "chat-1", "compare async runtimes", &ctx)
        .await
        .expect("should create mission");

    let mission = store
        .get_mission("mission-1")
        .await
        .expect("should query mission")
        .expect("mission should exist");
    assert_eq!(mission.status, MissionStatus::Planning);
    assert_eq!(mission.user_request, "compare async runtimes");
    assert_eq!(mission.mission_context.unwrap()["status"], "planning");

    store
        .update_mission_status("mission-1", MissionStatus::Failed, Some("provider down"))
        .await
        .expect("should update status");
    let mission = store.get_mission("mission-1").await.unwrap().unwrap();
    assert_eq!(mission.status, MissionStatus::Failed);
    assert_eq!(mission.error_info.as_deref(), Some("provider down"));

    let updated = serde_json::json!({"notes": ["n1"], "status": "failed"});
    store
        .update_mission_context("mission-1", &updated)
        .await
        .expect("should update context");
    let mission = store.get_mission("mission-1").await.unwrap().unwrap();
    assert_eq!(mission.mission_context.unwrap()["notes"][0], "n1");
}

#[tokio::test]
async fn test_get_all_missions_ordered() {
    let store = create_test_store().await;
    store.create_user("user-1", "admin", "hash").await.unwrap();
    store.create_chat("chat-1", "user-1", None).await.unwrap();

    let ctx = serde_json::json!({});
    store
        .create_mission("mission-a", "chat-1", "first", &ctx)
        .await
        .unwrap();
    store
        .create_mission("mission-b", "chat-1", "second", &ctx)
        .await
        .unwrap();

    let missions = store.get_all_missions().await.expect("should list");
    assert_eq!(missions.len(), 2);
}

#[tokio::test]
async fn test_execution_log_persistence() {
    let store = create_test_store().await;
    store.create_user("user-1", "admin", "hash").await.unwrap();
    store.create_chat("chat-1", "user-1", None).await.unwrap();
    store
        .create_mission("mission-1", "chat-1", "req", &serde_json::json!({}))
        .await
        .unwrap();

    store
        .create_execution_log(
            "log-1",
            "mission-1",
            Utc::now(),
            "ResearchAgent",
            "Execute Step",
            Some("step s1"),
            Some("3 notes gathered"),
            LogStatus::Success,
            None,
            Some(&serde_json::json!({"step_id": "s1"})),
            None,
            Some(&serde_json::json!({"cost": 0.01, "prompt_tokens": 100})),
            None,
            None,
            Some(0.01),
            Some(100),
            Some(25),
            None,
        )
        .await
        .expect("should persist log entry");

    let count = store
        .count_execution_logs("mission-1")
        .await
        .expect("should count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_document_group_membership_idempotent() {
    let store = create_test_store().await;
    store.create_user("user-1", "admin", "hash").await.unwrap();
    store
        .create_document_group("group-1", "user-1", "R: test group", None)
        .await
        .expect("should create group");

    assert!(store.document_group_exists("group-1").await.unwrap());
    assert!(!store.document_group_exists("group-2").await.unwrap());

    store
        .create_document(&DocumentRow {
            id: "doc-1".to_string(),
            user_id: "user-1".to_string(),
            filename: "doc-1.md".to_string(),
            original_filename: "Example Page".to_string(),
            file_path: "/tmp/doc-1.md".to_string(),
            processing_status: "pending".to_string(),
            metadata: Some(serde_json::json!({"source_url": "https://example.com"})),
        })
        .await
        .expect("should create document");

    store
        .add_document_to_group("group-1", "doc-1")
        .await
        .unwrap();
    store
        .add_document_to_group("group-1", "doc-1")
        .await
        .expect("re-adding should be a no-op");

    assert_eq!(store.group_member_count("group-1").await.unwrap(), 1);

    let doc = store
        .get_document("doc-1")
        .await
        .unwrap()
        .expect("document should exist");
    assert_eq!(doc.processing_status, "pending");
    assert_eq!(doc.metadata.unwrap()["source_url"], "https://example.com");
}

#[tokio::test]
async fn test_research_report_versioning() {
    let store = create_test_store().await;
    store.create_user("user-1", "admin", "hash").await.unwrap();
    store.create_chat("chat-1", "user-1", None).await.unwrap();
    store
        .create_mission("mission-1", "chat-1", "req", &serde_json::json!({}))
        .await
        .unwrap();

    let v1 = store
        .create_research_report("mission-1", "# Report v1", Some("Report v1"), None, true)
        .await
        .expect("should create report");
    assert_eq!(v1.version, 1);
    assert!(v1.is_current);

    let v2 = store
        .create_research_report(
            "mission-1",
            "# Report v2",
            Some("Report v2"),
            Some("tightened citations"),
            true,
        )
        .await
        .expect("should create second version");
    assert_eq!(v2.version, 2);

    let current = store
        .get_current_report("mission-1")
        .await
        .unwrap()
        .expect("should have a current report");
    assert_eq!(current.version, 2);
    assert_eq!(current.content, "# Report v2");

    // A draft version saved without make_current leaves v2 current.
    let v3 = store
        .create_research_report("mission-1", "# Report v3 draft", None, None, false)
        .await
        .unwrap();
    assert_eq!(v3.version, 3);
    let current = store.get_current_report("mission-1").await.unwrap().unwrap();
    assert_eq!(current.version, 2);

    assert_eq!(store.report_version_count("mission-1").await.unwrap(), 3);
}
