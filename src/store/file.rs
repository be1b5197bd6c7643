//! JSON file-based run store.

use super::{RunStore, now_string};
use crate::engine::types::AgentRun;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Default)]
struct RunStoreSnapshot {
    runs: HashMap<Uuid, AgentRun>,
}

#[derive(Clone)]
pub struct FileRunStore {
    path: PathBuf,
    runs: Arc<RwLock<HashMap<Uuid, AgentRun>>>,
    persist_lock: Arc<Mutex<()>>,
}

impl FileRunStore {
    pub async fn new(base_dir: PathBuf) -> Result<Self, String> {
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| format!("Failed to create run store dir: {}", e))?;
        let path = base_dir.join("runs.json");
        let snapshot = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<RunStoreSnapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("Failed to parse run store {}: {}", path.display(), e);
                    RunStoreSnapshot::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => RunStoreSnapshot::default(),
            Err(err) => {
                tracing::warn!("Failed to read run store {}: {}", path.display(), err);
                RunStoreSnapshot::default()
            }
        };

        Ok(Self {
            path,
            runs: Arc::new(RwLock::new(snapshot.runs)),
            persist_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn persist(&self) -> Result<(), String> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = RunStoreSnapshot {
            runs: self.runs.read().await.clone(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| format!("Failed to serialize run store: {}", e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data)
            .await
            .map_err(|e| format!("Failed to write run store: {}", e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| format!("Failed to finalize run store: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    fn is_persistent(&self) -> bool {
        true
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
        let mut stored = run.clone();
        stored.updated_at = now_string();
        self.runs.write().await.insert(stored.id, stored);
        self.persist().await
    }

    async fn delete_run(&self, id: Uuid) -> Result<bool, String> {
        let removed = self.runs.write().await.remove(&id).is_some();
        self.persist().await?;
        Ok(removed)
    }
}
