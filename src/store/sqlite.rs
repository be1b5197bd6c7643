//! SQLite-based run store (default backend).
//!
//! The run document is stored as one JSON column and replaced wholesale on
//! every save. Status and timestamps are mirrored into their own columns
//! for listing without deserializing every document.

use super::{RunStore, now_string};
use crate::engine::types::AgentRun;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    doc TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_updated_at ON runs(updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
"#;

pub struct SqliteRunStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRunStore {
    pub async fn new(base_dir: PathBuf) -> Result<Self, String> {
        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| format!("Failed to create run store dir: {}", e))?;
        let db_path = base_dir.join("runs.db");

        // Open database in a blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| format!("Failed to open SQLite database: {}", e))?;
            conn.execute_batch(SCHEMA)
                .map_err(|e| format!("Failed to run schema: {}", e))?;
            Ok::<_, String>(conn)
        })
        .await
        .map_err(|e| format!("Task join error: {}", e))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn decode(doc: String) -> Result<AgentRun, String> {
        serde_json::from_str(&doc).map_err(|e| format!("Failed to decode run document: {}", e))
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<AgentRun>, String> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT doc FROM runs ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2")
            .map_err(|e| format!("Failed to prepare list query: {}", e))?;
        let docs = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| format!("Failed to list runs: {}", e))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| format!("Failed to read run rows: {}", e))?;

        docs.into_iter().map(Self::decode).collect()
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<AgentRun>, String> {
        let conn = self.conn.lock().await;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM runs WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| format!("Failed to get run: {}", e))?;

        doc.map(Self::decode).transpose()
    }

    async fn save_run(&self, run: &AgentRun) -> Result<(), String> {
        let mut stored = run.clone();
        stored.updated_at = now_string();
        let doc = serde_json::to_string(&stored)
            .map_err(|e| format!("Failed to serialize run document: {}", e))?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO runs (id, status, created_at, updated_at, doc)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 updated_at = excluded.updated_at,
                 doc = excluded.doc",
            params![
                stored.id.to_string(),
                stored.status.to_string(),
                stored.created_at,
                stored.updated_at,
                doc
            ],
        )
        .map_err(|e| format!("Failed to save run: {}", e))?;
        Ok(())
    }

    async fn delete_run(&self, id: Uuid) -> Result<bool, String> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute("DELETE FROM runs WHERE id = ?1", params![id.to_string()])
            .map_err(|e| format!("Failed to delete run: {}", e))?;
        Ok(affected > 0)
    }
}
