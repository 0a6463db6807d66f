use crate::types::{AppError, LogStatus, MissionStatus, Result};
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection};

pub struct Store {
    // A single connection shared by every operation. Connections to a
    // `:memory:` database each see their own private database, so a
    // connect-per-operation scheme would lose the schema immediately.
    conn: Connection,
}

impl Store {
    /// Opens (or creates) a local SQLite database file.
    pub async fn new_local(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let store = Self { conn };
        store.initialize_schema().await?;

        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn new_memory() -> Result<Self> {
        Self::new_local(":memory:").await
    }

    pub fn connection(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create users table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                token_hash TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create sessions table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create chats table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS missions (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                user_request TEXT NOT NULL,
                status TEXT NOT NULL,
                error_info TEXT,
                generated_document_group_id TEXT,
                mission_context TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (chat_id) REFERENCES chats(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create missions table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS execution_logs (
                id TEXT PRIMARY KEY,
                mission_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                agent_name TEXT NOT NULL,
                action TEXT NOT NULL,
                input_summary TEXT,
                output_summary TEXT,
                status TEXT NOT NULL,
                error_message TEXT,
                full_input TEXT,
                full_output TEXT,
                model_details TEXT,
                tool_calls TEXT,
                file_interactions TEXT,
                cost REAL,
                prompt_tokens INTEGER,
                completion_tokens INTEGER,
                native_tokens INTEGER,
                FOREIGN KEY (mission_id) REFERENCES missions(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create execution_logs table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS document_groups (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create document_groups table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                file_path TEXT NOT NULL,
                processing_status TEXT NOT NULL,
                metadata TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create documents table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS document_group_members (
                group_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                added_at INTEGER NOT NULL,
                PRIMARY KEY (group_id, document_id),
                FOREIGN KEY (group_id) REFERENCES document_groups(id),
                FOREIGN KEY (document_id) REFERENCES documents(id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to create document_group_members table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS research_reports (
                id TEXT PRIMARY KEY,
                mission_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                title TEXT,
                content TEXT NOT NULL,
                revision_notes TEXT,
                is_current INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                UNIQUE(mission_id, version),
                FOREIGN KEY (mission_id) REFERENCES missions(id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to create research_reports table: {}", e))
        })?;

        Ok(())
    }

    // ============= User operations =============

    pub async fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO users (id, username, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (id, username, password_hash, now, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create user: {}", e)))?;

        Ok(())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT id, username, password_hash, created_at, updated_at
                 FROM users WHERE username = ?",
                [username],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query user: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Ok(Some(User {
                id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                username: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
                password_hash: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
                created_at: row.get(3).map_err(|e| AppError::Database(e.to_string()))?,
                updated_at: row.get(4).map_err(|e| AppError::Database(e.to_string()))?,
            }))
        } else {
            Ok(None)
        }
    }

    // ============= Session operations =============

    pub async fn create_session(
        &self,
        id: &str,
        user_id: &str,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (id, user_id, token_hash, expires_at, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create session: {}", e)))?;

        Ok(())
    }

    // ============= Chat operations =============

    pub async fn create_chat(&self, id: &str, user_id: &str, title: Option<&str>) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO chats (id, user_id, title, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (id, user_id, title, now, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create chat: {}", e)))?;

        Ok(())
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT id, user_id, title FROM chats WHERE id = ?",
                [chat_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query chat: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Ok(Some(Chat {
                id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                user_id: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
                title: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
            }))
        } else {
            Ok(None)
        }
    }

    // ============= Mission operations =============

    pub async fn create_mission(
        &self,
        mission_id: &str,
        chat_id: &str,
        user_request: &str,
        mission_context: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();
        let context_json = serde_json::to_string(mission_context)?;

        conn.execute(
            "INSERT INTO missions (id, chat_id, user_request, status, mission_context, created_at, updated_at)
             VALUES (?, ?, ?, 'planning', ?, ?, ?)",
            (mission_id, chat_id, user_request, context_json, now, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create mission: {}", e)))?;

        Ok(())
    }

    pub async fn get_mission(&self, mission_id: &str) -> Result<Option<MissionRow>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT id, chat_id, user_request, status, error_info,
                        generated_document_group_id, mission_context, created_at, updated_at
                 FROM missions WHERE id = ?",
                [mission_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query mission: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Ok(Some(Self::mission_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_all_missions(&self) -> Result<Vec<MissionRow>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT id, chat_id, user_request, status, error_info,
                        generated_document_group_id, mission_context, created_at, updated_at
                 FROM missions ORDER BY created_at ASC",
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query missions: {}", e)))?;

        let mut missions = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            missions.push(Self::mission_from_row(&row)?);
        }

        Ok(missions)
    }

    fn mission_from_row(row: &libsql::Row) -> Result<MissionRow> {
        let context_json: Option<String> =
            row.get(6).map_err(|e| AppError::Database(e.to_string()))?;
        // A context column that is not valid JSON loads as no context so
        // one bad row cannot block hydrating the others.
        let mission_context = context_json.and_then(|json| match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "Mission context column is not valid JSON, ignoring");
                None
            }
        });

        let status_str: String = row.get(3).map_err(|e| AppError::Database(e.to_string()))?;

        Ok(MissionRow {
            id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
            chat_id: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
            user_request: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
            status: MissionStatus::parse(&status_str).unwrap_or(MissionStatus::Planning),
            error_info: row.get(4).map_err(|e| AppError::Database(e.to_string()))?,
            generated_document_group_id: row
                .get(5)
                .map_err(|e| AppError::Database(e.to_string()))?,
            mission_context,
            created_at: row.get(7).map_err(|e| AppError::Database(e.to_string()))?,
            updated_at: row.get(8).map_err(|e| AppError::Database(e.to_string()))?,
        })
    }

    pub async fn update_mission_status(
        &self,
        mission_id: &str,
        status: MissionStatus,
        error_info: Option<&str>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "UPDATE missions SET status = ?, error_info = ?, updated_at = ? WHERE id = ?",
            (status.as_str(), error_info, now, mission_id),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to update mission status: {}", e)))?;

        Ok(())
    }

    pub async fn update_mission_context(
        &self,
        mission_id: &str,
        mission_context: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();
        let context_json = serde_json::to_string(mission_context)?;

        conn.execute(
            "UPDATE missions SET mission_context = ?, updated_at = ? WHERE id = ?",
            (context_json, now, mission_id),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to update mission context: {}", e)))?;

        Ok(())
    }

    pub async fn set_generated_document_group(
        &self,
        mission_id: &str,
        group_id: &str,
    ) -> Result<()> {
        let conn = self.connection()?;

        conn.execute(
            "UPDATE missions SET generated_document_group_id = ? WHERE id = ?",
            (group_id, mission_id),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to set generated group: {}", e)))?;

        Ok(())
    }

    // ============= Execution log operations =============

    #[allow(clippy::too_many_arguments)]
    pub async fn create_execution_log(
        &self,
        log_id: &str,
        mission_id: &str,
        timestamp: DateTime<Utc>,
        agent_name: &str,
        action: &str,
        input_summary: Option<&str>,
        output_summary: Option<&str>,
        status: LogStatus,
        error_message: Option<&str>,
        full_input: Option<&serde_json::Value>,
        full_output: Option<&serde_json::Value>,
        model_details: Option<&serde_json::Value>,
        tool_calls: Option<&serde_json::Value>,
        file_interactions: Option<&[String]>,
        cost: Option<f64>,
        prompt_tokens: Option<i64>,
        completion_tokens: Option<i64>,
        native_tokens: Option<i64>,
    ) -> Result<()> {
        let conn = self.connection()?;

        let full_input = full_input.map(|v| v.to_string());
        let full_output = full_output.map(|v| v.to_string());
        let model_details = model_details.map(|v| v.to_string());
        let tool_calls = tool_calls.map(|v| v.to_string());
        let file_interactions = match file_interactions {
            Some(files) => Some(serde_json::to_string(files)?),
            None => None,
        };

        conn.execute(
            "INSERT INTO execution_logs
             (id, mission_id, timestamp, agent_name, action, input_summary, output_summary,
              status, error_message, full_input, full_output, model_details, tool_calls,
              file_interactions, cost, prompt_tokens, completion_tokens, native_tokens)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                log_id,
                mission_id,
                timestamp.timestamp(),
                agent_name,
                action,
                input_summary,
                output_summary,
                status.as_str(),
                error_message,
                full_input,
                full_output,
                model_details,
                tool_calls,
                file_interactions,
                cost,
                prompt_tokens,
                completion_tokens,
                native_tokens,
            ],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create execution log: {}", e)))?;

        Ok(())
    }

    pub async fn count_execution_logs(&self, mission_id: &str) -> Result<i64> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM execution_logs WHERE mission_id = ?",
                [mission_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to count execution logs: {}", e)))?;

        let row = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::Database("Count query returned no rows".to_string()))?;

        row.get(0).map_err(|e| AppError::Database(e.to_string()))
    }

    // ============= Document group operations =============

    pub async fn create_document_group(
        &self,
        group_id: &str,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO document_groups (id, user_id, name, description, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (group_id, user_id, name, description, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create document group: {}", e)))?;

        Ok(())
    }

    pub async fn document_group_exists(&self, group_id: &str) -> Result<bool> {
        let conn = self.connection()?;

        let mut rows = conn
            .query("SELECT 1 FROM document_groups WHERE id = ?", [group_id])
            .await
            .map_err(|e| AppError::Database(format!("Failed to query document group: {}", e)))?;

        Ok(rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .is_some())
    }

    pub async fn create_document(
        &self,
        doc: &DocumentRow,
    ) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();
        let metadata = match &doc.metadata {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };

        conn.execute(
            "INSERT INTO documents
             (id, user_id, filename, original_filename, file_path, processing_status,
              metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                doc.id.as_str(),
                doc.user_id.as_str(),
                doc.filename.as_str(),
                doc.original_filename.as_str(),
                doc.file_path.as_str(),
                doc.processing_status.as_str(),
                metadata,
                now,
                now,
            ],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create document: {}", e)))?;

        Ok(())
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Option<DocumentRow>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT id, user_id, filename, original_filename, file_path,
                        processing_status, metadata
                 FROM documents WHERE id = ?",
                [doc_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query document: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let metadata_json: Option<String> =
                row.get(6).map_err(|e| AppError::Database(e.to_string()))?;
            let metadata = match metadata_json {
                Some(json) => Some(
                    serde_json::from_str(&json)
                        .map_err(|e| AppError::Database(format!("Corrupt document metadata: {}", e)))?,
                ),
                None => None,
            };

            Ok(Some(DocumentRow {
                id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                user_id: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
                filename: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
                original_filename: row.get(3).map_err(|e| AppError::Database(e.to_string()))?,
                file_path: row.get(4).map_err(|e| AppError::Database(e.to_string()))?,
                processing_status: row.get(5).map_err(|e| AppError::Database(e.to_string()))?,
                metadata,
            }))
        } else {
            Ok(None)
        }
    }

    /// Adds a document to a group. Idempotent: re-adding is a no-op.
    pub async fn add_document_to_group(&self, group_id: &str, document_id: &str) -> Result<()> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT OR IGNORE INTO document_group_members (group_id, document_id, added_at)
             VALUES (?, ?, ?)",
            (group_id, document_id, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to add document to group: {}", e)))?;

        Ok(())
    }

    pub async fn group_member_count(&self, group_id: &str) -> Result<i64> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM document_group_members WHERE group_id = ?",
                [group_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to count group members: {}", e)))?;

        let row = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::Database("Count query returned no rows".to_string()))?;

        row.get(0).map_err(|e| AppError::Database(e.to_string()))
    }

    // ============= Research report operations =============

    /// Creates a new version of a mission's research report. When
    /// `make_current` is set, the previous current version loses its flag.
    pub async fn create_research_report(
        &self,
        mission_id: &str,
        content: &str,
        title: Option<&str>,
        revision_notes: Option<&str>,
        make_current: bool,
    ) -> Result<ResearchReport> {
        let conn = self.connection()?;
        let now = Utc::now().timestamp();

        let mut rows = conn
            .query(
                "SELECT COALESCE(MAX(version), 0) FROM research_reports WHERE mission_id = ?",
                [mission_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query report versions: {}", e)))?;

        let max_version: i64 = match rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Some(row) => row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
            None => 0,
        };
        let version = max_version + 1;

        if make_current {
            conn.execute(
                "UPDATE research_reports SET is_current = 0 WHERE mission_id = ?",
                [mission_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to clear current report: {}", e)))?;
        }

        let report_id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO research_reports
             (id, mission_id, version, title, content, revision_notes, is_current, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                report_id.as_str(),
                mission_id,
                version,
                title,
                content,
                revision_notes,
                make_current as i64,
                now,
            ],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create research report: {}", e)))?;

        Ok(ResearchReport {
            id: report_id,
            mission_id: mission_id.to_string(),
            version,
            title: title.map(|s| s.to_string()),
            content: content.to_string(),
            revision_notes: revision_notes.map(|s| s.to_string()),
            is_current: make_current,
        })
    }

    pub async fn get_current_report(&self, mission_id: &str) -> Result<Option<ResearchReport>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT id, mission_id, version, title, content, revision_notes, is_current
                 FROM research_reports WHERE mission_id = ? AND is_current = 1",
                [mission_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query current report: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let is_current: i64 = row.get(6).map_err(|e| AppError::Database(e.to_string()))?;
            Ok(Some(ResearchReport {
                id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                mission_id: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
                version: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
                title: row.get(3).map_err(|e| AppError::Database(e.to_string()))?,
                content: row.get(4).map_err(|e| AppError::Database(e.to_string()))?,
                revision_notes: row.get(5).map_err(|e| AppError::Database(e.to_string()))?,
                is_current: is_current != 0,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn report_version_count(&self, mission_id: &str) -> Result<i64> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM research_reports WHERE mission_id = ?",
                [mission_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to count report versions: {}", e)))?;

        let row = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::Database("Count query returned no rows".to_string()))?;

        row.get(0).map_err(|e| AppError::Database(e.to_string()))
    }
}

// ============= Row types =============

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MissionRow {
    pub id: String,
    pub chat_id: String,
    pub user_request: String,
    pub status: MissionStatus,
    pub error_info: Option<String>,
    pub generated_document_group_id: Option<String>,
    pub mission_context: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub processing_status: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub id: String,
    pub mission_id: String,
    pub version: i64,
    pub title: Option<String>,
    pub content: String,
    pub revision_notes: Option<String>,
    pub is_current: bool,
}
