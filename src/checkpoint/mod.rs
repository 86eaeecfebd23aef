//! 检查点存储抽象层
//!
//! 按会话 ID 保存「状态 + 引擎游标」的完整快照，put 为整体替换。提供内存和 SQLite 两种实现。

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{CheckpointBackend, CheckpointConfig};
use crate::core::WorkflowError;
use crate::session::SessionState;
use crate::workflow::Cursor;

pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub state: SessionState,
    pub cursor: Cursor,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session_id: impl Into<String>, state: SessionState, cursor: Cursor) -> Self {
        Self {
            session_id: session_id.into(),
            state,
            cursor,
            updated_at: Utc::now(),
        }
    }
}

/// 检查点存储接口
///
/// 不同会话的键互不影响；同一会话的并发访问由上层 SessionSupervisor 串行化。
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>, WorkflowError>;

    /// 整体替换该会话的检查点
    async fn put(&self, checkpoint: Checkpoint) -> Result<(), WorkflowError>;

    /// 删除检查点，返回是否存在过
    async fn delete(&self, session_id: &str) -> Result<bool, WorkflowError>;

    /// 已保存的全部会话 ID（升序）
    async fn list(&self) -> Result<Vec<String>, WorkflowError>;
}

/// 创建检查点存储
///
/// 配置为 sqlite 时打开（必要时创建）数据库文件；打开失败直接返回错误，不静默回退到内存。
pub fn create_checkpoint_store(
    config: &CheckpointConfig,
) -> Result<Arc<dyn CheckpointStore>, WorkflowError> {
    match config.backend {
        CheckpointBackend::Sqlite => {
            let store = SqliteCheckpointStore::open(&config.db_path)?;
            tracing::info!("Using SQLite checkpoint store: {:?}", config.db_path);
            Ok(Arc::new(store))
        }
        CheckpointBackend::Memory => {
            tracing::info!("Using in-memory checkpoint store");
            Ok(Arc::new(MemoryCheckpointStore::new()))
        }
    }
}
