//! SQLite 检查点存储
//!
//! 每个会话一行：state / cursor 以 JSON 文本保存，写入使用 upsert 整体替换。
//! rusqlite 为同步接口，所有访问都放到 spawn_blocking 中执行。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Checkpoint, CheckpointStore};
use crate::core::WorkflowError;

pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

fn db_err(e: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::Checkpoint(e.to_string())
}

impl SqliteCheckpointStore {
    /// 打开（不存在则创建）数据库文件并初始化表
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(db_err)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// 内存数据库，用于测试
    pub fn open_in_memory() -> Result<Self, WorkflowError> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self, WorkflowError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                session_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                cursor TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, WorkflowError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, WorkflowError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|p| p.into_inner());
            f(&guard)
        })
        .await
        .map_err(db_err)?
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>, WorkflowError> {
        let id = session_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT state, cursor, updated_at FROM checkpoints WHERE session_id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .map_err(db_err)?;

            let Some((state, cursor, updated_at)) = row else {
                return Ok(None);
            };
            Ok(Some(Checkpoint {
                session_id: id,
                state: serde_json::from_str(&state).map_err(db_err)?,
                cursor: serde_json::from_str(&cursor).map_err(db_err)?,
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map_err(db_err)?
                    .with_timezone(&Utc),
            }))
        })
        .await
    }

    async fn put(&self, checkpoint: Checkpoint) -> Result<(), WorkflowError> {
        let state = serde_json::to_string(&checkpoint.state).map_err(db_err)?;
        let cursor = serde_json::to_string(&checkpoint.cursor).map_err(db_err)?;
        let updated_at = checkpoint.updated_at.to_rfc3339();
        let id = checkpoint.session_id;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints (session_id, state, cursor, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(session_id) DO UPDATE SET
                    state = excluded.state,
                    cursor = excluded.cursor,
                    updated_at = excluded.updated_at",
                params![id, state, cursor, updated_at],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, session_id: &str) -> Result<bool, WorkflowError> {
        let id = session_id.to_string();
        self.with_conn(move |conn| {
            let n = conn
                .execute("DELETE FROM checkpoints WHERE session_id = ?1", params![id])
                .map_err(db_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<String>, WorkflowError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT session_id FROM checkpoints ORDER BY session_id")
                .map_err(db_err)?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;
            Ok(ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InputType, SessionState};
    use crate::workflow::{Cursor, NodeName};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("checkpoints.db");

        let mut state = SessionState::with_topic("Rust", "knows Python");
        state.quiz_answers.insert(0, "A".into());
        state.set_paused(InputType::Quiz);
        {
            let store = SqliteCheckpointStore::open(&path).unwrap();
            store
                .put(Checkpoint::new("s1", state.clone(), Cursor::Exit(NodeName::Quiz)))
                .await
                .unwrap();
        }

        let store = SqliteCheckpointStore::open(&path).unwrap();
        let got = store.get("s1").await.unwrap().unwrap();
        assert_eq!(got.state, state);
        assert_eq!(got.cursor, Cursor::Exit(NodeName::Quiz));
    }

    #[tokio::test]
    async fn test_upsert_and_delete() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        let mut state = SessionState::default();
        store
            .put(Checkpoint::new("b", state.clone(), Cursor::Enter(NodeName::Extract)))
            .await
            .unwrap();
        state.attempt_count = 2;
        store
            .put(Checkpoint::new("b", state.clone(), Cursor::Finished))
            .await
            .unwrap();
        store
            .put(Checkpoint::new("a", SessionState::default(), Cursor::Finished))
            .await
            .unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
        let got = store.get("b").await.unwrap().unwrap();
        assert_eq!(got.state.attempt_count, 2);
        assert_eq!(got.cursor, Cursor::Finished);

        assert!(store.delete("b").await.unwrap());
        assert!(store.get("b").await.unwrap().is_none());
    }
}
