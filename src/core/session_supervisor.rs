//! 会话监管：同一会话的互斥执行与取消
//!
//! 每次 start / resume / proceed 先登记会话 ID 并拿到 CancellationToken；已登记的会话再次进入时
//! 返回 SessionBusy。守卫 Drop 时自动注销，任何退出路径都会释放。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::core::WorkflowError;

type ActiveMap = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// 进行中的会话表：会话 ID → 本次执行的取消令牌
#[derive(Debug, Clone, Default)]
pub struct SessionSupervisor {
    active: ActiveMap,
}

fn lock(active: &ActiveMap) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记会话；已在执行中则返回 SessionBusy
    pub fn try_acquire(&self, session_id: &str) -> Result<SessionGuard, WorkflowError> {
        let mut active = lock(&self.active);
        if active.contains_key(session_id) {
            return Err(WorkflowError::SessionBusy(session_id.to_string()));
        }
        let token = CancellationToken::new();
        active.insert(session_id.to_string(), token.clone());
        Ok(SessionGuard {
            session_id: session_id.to_string(),
            token,
            active: Arc::clone(&self.active),
        })
    }

    /// 取消正在执行的会话；返回是否找到
    pub fn cancel(&self, session_id: &str) -> bool {
        match lock(&self.active).get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self, session_id: &str) -> bool {
        lock(&self.active).contains_key(session_id)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

/// 会话执行守卫
#[derive(Debug)]
pub struct SessionGuard {
    session_id: String,
    token: CancellationToken,
    active: ActiveMap,
}

impl SessionGuard {
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let supervisor = SessionSupervisor::new();
        let _guard = supervisor.try_acquire("s1").unwrap();
        assert!(matches!(
            supervisor.try_acquire("s1"),
            Err(WorkflowError::SessionBusy(id)) if id == "s1"
        ));
        assert!(supervisor.try_acquire("s2").is_ok());
    }

    #[test]
    fn test_guard_drop_releases() {
        let supervisor = SessionSupervisor::new();
        {
            let _guard = supervisor.try_acquire("s1").unwrap();
            assert!(supervisor.is_busy("s1"));
        }
        assert!(!supervisor.is_busy("s1"));
        assert_eq!(supervisor.active_count(), 0);
    }

    #[test]
    fn test_cancel_trips_token() {
        let supervisor = SessionSupervisor::new();
        let guard = supervisor.try_acquire("s1").unwrap();
        let token = guard.cancel_token();
        assert!(supervisor.cancel("s1"));
        assert!(token.is_cancelled());
        assert!(!supervisor.cancel("missing"));
    }
}
