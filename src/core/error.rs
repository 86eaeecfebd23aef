//! 工作流错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 WorkflowError 决定 RetryGeneration / Abort 等。

use thiserror::Error;

use crate::session::InputType;

/// 外部内容生成失败（后端报错、输出不符合结构、超时）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generator backend error: {0}")]
    Backend(String),

    #[error("Generated content failed validation: {0}")]
    InvalidOutput(String),

    #[error("Collaborator call timed out: {0}")]
    Timeout(String),
}

/// 工作流执行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// 节点缺少前置产物：属于程序缺陷，不做默认值兜底
    #[error("Precondition failed in {node}: {reason}")]
    Precondition { node: &'static str, reason: String },

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// 进度决策返回了 advance / repeat 以外的值
    #[error("Routing error: progress decision '{0}' is neither advance nor repeat")]
    Routing(String),

    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} is not waiting for input")]
    NotWaitingForInput(String),

    #[error("Session is waiting for {expected} input")]
    UnexpectedInput { expected: InputType },

    #[error("Cancelled")]
    Cancelled,

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl WorkflowError {
    pub fn precondition(node: &'static str, reason: impl Into<String>) -> Self {
        WorkflowError::Precondition {
            node,
            reason: reason.into(),
        }
    }

    /// 可以原样重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkflowError::Generation(_))
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 从最近检查点重跑失败的节点
    RetryGeneration,
    /// 调用方输入有误，会话状态未变，可直接重新提交
    RejectInput(String),
    /// 终止本次调用，会话保持在失败前的检查点
    Abort,
}
