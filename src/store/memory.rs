//! In-memory run store (non-persistent, for testing).

use super::RunStore;
use crate::engine::types::AgentRun;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryRunStore {
    runs: Arc<RwLock<HashMap<Uuid, AgentRun>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<AgentRun>, String> {
        let mut runs: Vec<AgentRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(runs.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<AgentRun>, String> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn save_run(&self, run: &AgentRun) -> Result<(), String> {
        self.runs.write().await.insert(run.id, run.clone());
        Ok(())
    }

    async fn delete_run(&self, id: Uuid) -> Result<bool, String> {
        Ok(self.runs.write().await.remove(&id).is_some())
    }
}
