//! 会话服务：面向传输层的请求 / 响应接口
//!
//! 把 WorkflowEngine 的结果投影为 SessionView，把 WorkflowError 映射为传输错误码；
//! 生成类错误按 RecoveryEngine 的预算从最近检查点重跑（proceed），引擎内部不做重试。

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::agents::parse_question_key;
use crate::core::{GenerationError, RecoveryAction, RecoveryEngine, SessionView, WorkflowError};
use crate::session::{InputType, SessionPatch, SessionState};
use crate::workflow::{RunOutcome, WorkflowEngine};

/// 传输层错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SessionNotFound,
    NotWaitingForInput,
    /// 会话在等待另一种输入
    InvalidInput,
    SessionBusy,
    InternalGenerationFailure,
    /// 前置条件、路由、检查点等程序错误，以及取消
    InternalError,
}

impl From<&WorkflowError> for ErrorCode {
    fn from(err: &WorkflowError) -> Self {
        match err {
            WorkflowError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            WorkflowError::NotWaitingForInput(_) => ErrorCode::NotWaitingForInput,
            WorkflowError::UnexpectedInput { .. } => ErrorCode::InvalidInput,
            WorkflowError::SessionBusy(_) => ErrorCode::SessionBusy,
            WorkflowError::Generation(_) => ErrorCode::InternalGenerationFailure,
            WorkflowError::Precondition { .. }
            | WorkflowError::Routing(_)
            | WorkflowError::Cancelled
            | WorkflowError::Checkpoint(_) => ErrorCode::InternalError,
        }
    }
}

/// 错误描述 + 会话当前（未被修改的）状态视图
#[derive(Debug, Clone, Error, Serialize)]
#[error("{code:?}: {message}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    pub view: Option<SessionView>,
}

pub type ServiceResult = Result<SessionView, ServiceError>;

pub struct SessionService {
    engine: Arc<WorkflowEngine>,
    recovery: RecoveryEngine,
    extraction_timeout: Duration,
}

impl SessionService {
    pub fn new(engine: Arc<WorkflowEngine>, recovery: RecoveryEngine) -> Self {
        Self {
            engine,
            recovery,
            extraction_timeout: Duration::from_secs(60),
        }
    }

    /// 自由文本抽取调用的超时
    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    /// 已知主题与背景，直接开始
    pub async fn start(&self, session_id: &str, topic: &str, background: &str) -> ServiceResult {
        let initial = SessionState::with_topic(topic.trim(), background.trim());
        self.run(session_id, self.engine.start(session_id, initial)).await
    }

    /// 对话模式：从一句自由文本请求开始
    pub async fn start_from_query(&self, session_id: &str, query: &str) -> ServiceResult {
        let initial = SessionState::from_query(query.trim());
        self.run(session_id, self.engine.start(session_id, initial)).await
    }

    /// 提交测验答案，键为 "q0" 或 "0"；无法解析的键被丢弃
    pub async fn submit_quiz_answers(
        &self,
        session_id: &str,
        answers: HashMap<String, String>,
    ) -> ServiceResult {
        let mut parsed = BTreeMap::new();
        for (key, value) in answers {
            match parse_question_key(&key) {
                Some(idx) => {
                    parsed.insert(idx, value);
                }
                None => tracing::warn!(session = session_id, key = %key, "ignoring answer with unknown key"),
            }
        }
        self.resume(session_id, SessionPatch::quiz(parsed)).await
    }

    pub async fn submit_assignment(&self, session_id: &str, submission: &str) -> ServiceResult {
        self.resume(session_id, SessionPatch::assignment(submission))
            .await
    }

    pub async fn submit_new_query(&self, session_id: &str, query: &str) -> ServiceResult {
        self.resume(session_id, SessionPatch::query(query.trim())).await
    }

    /// 对话式提交：按会话当前等待的输入类型，用 AnswerExtractor 从自由文本中取出答案 / 作业 / 新请求
    pub async fn submit_free_text(&self, session_id: &str, raw: &str) -> ServiceResult {
        let state = self
            .engine
            .snapshot(session_id)
            .await
            .map_err(|e| self.describe(session_id, e, None))?;
        if !state.waiting_for_input {
            let err = WorkflowError::NotWaitingForInput(session_id.to_string());
            return Err(self.describe(session_id, err, Some(&state)));
        }

        let extractor = &self.engine.collaborators().extractor;
        let patch = match state.input_type {
            InputType::Quiz => {
                let description = state.quiz.as_ref().map(|q| q.describe()).unwrap_or_default();
                let answers = self
                    .extract(extractor.extract_quiz_answers(raw, &description))
                    .await
                    .map_err(|e| self.describe(session_id, e, Some(&state)))?;
                SessionPatch::quiz(answers)
            }
            InputType::Assignment => {
                let description = state
                    .assignment
                    .as_ref()
                    .map(|a| a.describe())
                    .unwrap_or_default();
                let submission = self
                    .extract(extractor.extract_assignment_submission(raw, &description))
                    .await
                    .map_err(|e| self.describe(session_id, e, Some(&state)))?;
                SessionPatch::assignment(submission)
            }
            InputType::ExtractionRetry | InputType::NewQuery => SessionPatch::query(raw.trim()),
            InputType::None => {
                let err = WorkflowError::NotWaitingForInput(session_id.to_string());
                return Err(self.describe(session_id, err, Some(&state)));
            }
        };
        self.resume(session_id, patch).await
    }

    /// 节点失败后手动重跑
    pub async fn retry(&self, session_id: &str) -> ServiceResult {
        self.run(session_id, self.engine.proceed(session_id)).await
    }

    pub async fn view(&self, session_id: &str) -> ServiceResult {
        let state = self
            .engine
            .snapshot(session_id)
            .await
            .map_err(|e| self.describe(session_id, e, None))?;
        Ok(SessionView::project(session_id, &state))
    }

    /// 完整状态（终端需要展示讲义等视图之外的内容）
    pub async fn snapshot(&self, session_id: &str) -> Result<SessionState, ServiceError> {
        self.engine
            .snapshot(session_id)
            .await
            .map_err(|e| self.describe(session_id, e, None))
    }

    async fn resume(&self, session_id: &str, patch: SessionPatch) -> ServiceResult {
        self.run(session_id, self.engine.resume(session_id, patch))
            .await
    }

    async fn extract<T, F>(&self, fut: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, GenerationError>>,
    {
        match tokio::time::timeout(self.extraction_timeout, fut).await {
            Ok(r) => r.map_err(WorkflowError::from),
            Err(_) => Err(GenerationError::Timeout("answer extraction".to_string()).into()),
        }
    }

    /// 执行一次引擎调用；生成错误在预算内从检查点重跑
    async fn run<F>(&self, session_id: &str, first: F) -> ServiceResult
    where
        F: Future<Output = Result<RunOutcome, WorkflowError>>,
    {
        let mut result = first.await;
        let mut attempt = 0;
        loop {
            let err = match result {
                Ok(outcome) => return Ok(SessionView::project(session_id, outcome.state())),
                Err(err) => err,
            };
            attempt += 1;
            match self.recovery.handle(&err, attempt) {
                RecoveryAction::RetryGeneration => {
                    tracing::warn!(
                        session = session_id,
                        attempt,
                        max = self.recovery.max_retries(),
                        error = %err,
                        "generation failed, retrying from checkpoint"
                    );
                    result = self.engine.proceed(session_id).await;
                }
                RecoveryAction::RejectInput(reason) => {
                    tracing::info!(session = session_id, %reason, "input rejected");
                    return Err(self.fail(session_id, err).await);
                }
                RecoveryAction::Abort => {
                    tracing::error!(session = session_id, error = %err, "session call failed");
                    return Err(self.fail(session_id, err).await);
                }
            }
        }
    }

    async fn fail(&self, session_id: &str, err: WorkflowError) -> ServiceError {
        let state = self.engine.snapshot(session_id).await.ok();
        ServiceError {
            code: ErrorCode::from(&err),
            message: err.to_string(),
            view: state.map(|s| SessionView::project(session_id, &s)),
        }
    }

    fn describe(
        &self,
        session_id: &str,
        err: WorkflowError,
        state: Option<&SessionState>,
    ) -> ServiceError {
        ServiceError {
            code: ErrorCode::from(&err),
            message: err.to_string(),
            view: state.map(|s| SessionView::project(session_id, s)),
        }
    }
}
