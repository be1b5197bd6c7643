//! Run storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `file`: JSON file-based storage
//! - `sqlite`: SQLite database (default)
//!
//! The run document is the only shared mutable resource per run and is
//! always read-modify-written wholesale: `save` replaces the whole document.
//! The engine calls `save` after every step and at every state transition,
//! so step statuses on disk are the single source of truth for what has run.

mod file;
mod memory;
mod sqlite;

pub use file::FileRunStore;
pub use memory::InMemoryRunStore;
pub use sqlite::SqliteRunStore;

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

use crate::engine::types::AgentRun;

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Run store trait - implemented by all storage backends.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// List runs, ordered by updated_at descending.
    async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<AgentRun>, String>;

    /// Get a single run by ID.
    async fn get_run(&self, id: Uuid) -> Result<Option<AgentRun>, String>;

    /// Save a run, replacing the whole document (insert or update).
    async fn save_run(&self, run: &AgentRun) -> Result<(), String>;

    /// Delete a run. Returns whether it existed.
    async fn delete_run(&self, id: Uuid) -> Result<bool, String>;
}

/// Run store type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStoreType {
    Memory,
    File,
    #[default]
    Sqlite,
}

impl RunStoreType {
    /// Parse from environment variable value.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "file" | "json" => Self::File,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a run store based on type and configuration.
pub async fn create_run_store(
    store_type: RunStoreType,
    base_dir: PathBuf,
) -> Result<Box<dyn RunStore>, String> {
    match store_type {
        RunStoreType::Memory => Ok(Box::new(InMemoryRunStore::new())),
        RunStoreType::File => {
            let store = FileRunStore::new(base_dir).await?;
            Ok(Box::new(store))
        }
        RunStoreType::Sqlite => {
            let store = SqliteRunStore::new(base_dir).await?;
            Ok(Box::new(store))
        }
    }
}
