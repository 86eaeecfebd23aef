//! 错误恢复引擎
//!
//! 根据 WorkflowError 类型与已重试次数返回 RecoveryAction，供 SessionService 决定是重跑、拒绝输入还是终止。

use crate::core::{RecoveryAction, WorkflowError};

/// 有界重试：只有生成类错误会被重跑，且不超过 max_retries 次
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_retries: u32,
}

impl RecoveryEngine {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// attempt 为已经失败的次数（从 1 开始）
    pub fn handle(&self, err: &WorkflowError, attempt: u32) -> RecoveryAction {
        match err {
            WorkflowError::Generation(_) if attempt <= self.max_retries => {
                RecoveryAction::RetryGeneration
            }
            WorkflowError::NotWaitingForInput(_) | WorkflowError::UnexpectedInput { .. } => {
                RecoveryAction::RejectInput(err.to_string())
            }
            _ => RecoveryAction::Abort,
        }
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(2)
    }
}
