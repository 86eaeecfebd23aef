//! 工作流引擎
//!
//! 按转移表逐个执行节点，每个节点完成后把「状态 + 游标」整体写入检查点，再选择出边。
//! 遇到暂停边界时写入暂停标记并返回；resume 合并学员输入后从边界处继续。
//! 节点失败（生成错误、超时、取消）时不写检查点，会话停在失败前的位置，可用 proceed 重跑。

use std::sync::Arc;
use std::time::Duration;

use super::builder::Collaborators;
use super::graph::{route_decision, route_extraction, route_progress, BranchKind, Edge, WorkflowGraph};
use super::interrupt::InterruptController;
use super::nodes::{self, NodeContext};
use super::types::{Cursor, RunOutcome};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::core::{SessionGuard, SessionSupervisor, WorkflowError};
use crate::session::{SessionPatch, SessionState};

pub struct WorkflowEngine {
    graph: WorkflowGraph,
    interrupts: InterruptController,
    collaborators: Collaborators,
    store: Arc<dyn CheckpointStore>,
    supervisor: SessionSupervisor,
    timeout: Duration,
}

impl WorkflowEngine {
    pub(crate) fn new(
        graph: WorkflowGraph,
        interrupts: InterruptController,
        collaborators: Collaborators,
        store: Arc<dyn CheckpointStore>,
        supervisor: SessionSupervisor,
        timeout: Duration,
    ) -> Self {
        Self {
            graph,
            interrupts,
            collaborators,
            store,
            supervisor,
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// 以 initial 为初始状态从头执行；同 ID 的旧检查点被覆盖
    pub async fn start(
        &self,
        session_id: &str,
        initial: SessionState,
    ) -> Result<RunOutcome, WorkflowError> {
        let guard = self.supervisor.try_acquire(session_id)?;
        let mut state = initial;
        state.clear_pause();
        let cursor = Cursor::Enter(WorkflowGraph::START);
        self.persist(session_id, &state, cursor).await?;
        tracing::info!(session = session_id, "session started");
        self.drive(&guard, state, cursor, false).await
    }

    /// 合并学员输入并从暂停边界继续
    ///
    /// 会话未处于等待状态时返回 NotWaitingForInput，补丁缺少所需字段时返回 UnexpectedInput，
    /// 两种情况下检查点都不变。
    pub async fn resume(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<RunOutcome, WorkflowError> {
        let guard = self.supervisor.try_acquire(session_id)?;
        let checkpoint = self.load(session_id).await?;
        let mut state = checkpoint.state;
        if !state.waiting_for_input {
            return Err(WorkflowError::NotWaitingForInput(session_id.to_string()));
        }
        if !patch.satisfies(state.input_type) {
            return Err(WorkflowError::UnexpectedInput {
                expected: state.input_type,
            });
        }

        tracing::info!(session = session_id, input = %state.input_type, "resuming");
        patch.apply(&mut state);
        state.clear_pause();
        // 输入与解除暂停一起落盘，后续节点失败时 proceed 不需要重新提交
        self.persist(session_id, &state, checkpoint.cursor).await?;
        self.drive(&guard, state, checkpoint.cursor, true).await
    }

    /// 从最近的检查点继续执行（节点失败后的重试入口）
    ///
    /// 会话正等待输入时原样返回当前暂停，已结束时返回 Completed。
    pub async fn proceed(&self, session_id: &str) -> Result<RunOutcome, WorkflowError> {
        let guard = self.supervisor.try_acquire(session_id)?;
        let checkpoint = self.load(session_id).await?;
        let state = checkpoint.state;
        if state.waiting_for_input {
            return Ok(RunOutcome::Paused {
                input_type: state.input_type,
                state,
            });
        }
        tracing::info!(session = session_id, cursor = %checkpoint.cursor, "proceeding from checkpoint");
        self.drive(&guard, state, checkpoint.cursor, true).await
    }

    /// 最近一次提交的状态
    pub async fn snapshot(&self, session_id: &str) -> Result<SessionState, WorkflowError> {
        Ok(self.load(session_id).await?.state)
    }

    pub async fn checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>, WorkflowError> {
        self.store.get(session_id).await
    }

    /// 取消正在执行的节点；返回该会话是否在执行中
    pub fn cancel(&self, session_id: &str) -> bool {
        self.supervisor.cancel(session_id)
    }

    async fn load(&self, session_id: &str) -> Result<Checkpoint, WorkflowError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| WorkflowError::SessionNotFound(session_id.to_string()))
    }

    async fn persist(
        &self,
        session_id: &str,
        state: &SessionState,
        cursor: Cursor,
    ) -> Result<(), WorkflowError> {
        self.store
            .put(Checkpoint::new(session_id, state.clone(), cursor))
            .await
    }

    /// 主循环：查表前进，直到暂停或结束
    ///
    /// `released` 为 true 时，起始游标上的 pause-before 已被学员输入解除，不再重复暂停。
    async fn drive(
        &self,
        guard: &SessionGuard,
        mut state: SessionState,
        mut cursor: Cursor,
        mut released: bool,
    ) -> Result<RunOutcome, WorkflowError> {
        let session_id = guard.session_id();
        let ctx = NodeContext {
            session_id,
            collaborators: &self.collaborators,
            cancel: guard.cancel_token(),
            timeout: self.timeout,
        };

        loop {
            if ctx.cancel.is_cancelled() {
                tracing::warn!(session = session_id, %cursor, "cancelled");
                return Err(WorkflowError::Cancelled);
            }

            match cursor {
                Cursor::Finished => {
                    tracing::info!(session = session_id, "session completed");
                    return Ok(RunOutcome::Completed { state });
                }

                Cursor::Enter(node) => {
                    if self.interrupts.pause_before(node) && !released {
                        let input_type = self.interrupts.input_type(node, &state);
                        state.set_paused(input_type);
                        self.persist(session_id, &state, cursor).await?;
                        tracing::info!(
                            session = session_id,
                            %node,
                            input = %input_type,
                            reason = self.interrupts.reason(node),
                            "paused before node"
                        );
                        return Ok(RunOutcome::Paused { input_type, state });
                    }
                    released = false;

                    tracing::info!(session = session_id, %node, "node start");
                    let mut next = nodes::run(node, &ctx, state.clone()).await.map_err(|e| {
                        tracing::warn!(session = session_id, %node, error = %e, "node failed");
                        e
                    })?;
                    if self.interrupts.pause_after(node) {
                        next.set_paused(self.interrupts.input_type(node, &next));
                    }
                    cursor = Cursor::Exit(node);
                    self.persist(session_id, &next, cursor).await?;
                    state = next;

                    if state.waiting_for_input {
                        tracing::info!(
                            session = session_id,
                            %node,
                            input = %state.input_type,
                            reason = self.interrupts.reason(node),
                            "paused after node"
                        );
                        return Ok(RunOutcome::Paused {
                            input_type: state.input_type,
                            state,
                        });
                    }
                }

                Cursor::Exit(node) => {
                    // 解除只对起始游标上的 Enter 有效
                    released = false;
                    let mut next = state.clone();
                    let target = match self.graph.edge(node) {
                        Edge::To(to) => Some(to),
                        Edge::Branch(BranchKind::Extraction) => route_extraction(&next),
                        Edge::Branch(BranchKind::Progress) => route_progress(&next),
                        Edge::Branch(BranchKind::Decision) if next.completed => None,
                        Edge::Branch(BranchKind::Decision) => {
                            route_decision(nodes::decide(&ctx, &mut next).await?)
                        }
                    };
                    cursor = target.map_or(Cursor::Finished, Cursor::Enter);
                    tracing::debug!(session = session_id, from = %node, to = %cursor, "transition");
                    self.persist(session_id, &next, cursor).await?;
                    state = next;
                }
            }
        }
    }
}
