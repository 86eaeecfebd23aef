//! 内存检查点存储（进程退出即丢失）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore};
use crate::core::WorkflowError;

#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>, WorkflowError> {
        Ok(self.entries.read().await.get(session_id).cloned())
    }

    async fn put(&self, checkpoint: Checkpoint) -> Result<(), WorkflowError> {
        self.entries
            .write()
            .await
            .insert(checkpoint.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, WorkflowError> {
        Ok(self.entries.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, WorkflowError> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
