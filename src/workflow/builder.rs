//! 引擎构建器
//!
//! 外部协作方通过 [`Collaborators`] 注入，检查点存储与超时可选，未设置时使用内存存储与配置默认值。

use std::sync::Arc;
use std::time::Duration;

use crate::agents::{
    AnswerEvaluator, AnswerExtractor, ContentGenerator, LlmAnswerExtractor, LlmContentGenerator,
    OfflineContentGenerator,
};
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::config::{AppConfig, LlmProvider, WorkflowSection};
use crate::core::SessionSupervisor;
use crate::llm::{LlmClient, OpenAiClient};

use super::engine::WorkflowEngine;
use super::graph::WorkflowGraph;
use super::interrupt::InterruptController;

/// 节点可调用的全部外部协作方
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn ContentGenerator>,
    pub evaluator: Arc<dyn AnswerEvaluator>,
    pub extractor: Arc<dyn AnswerExtractor>,
}

impl Collaborators {
    /// 同一个实现同时承担三种角色（如离线生成器）
    pub fn uniform<T>(inner: Arc<T>) -> Self
    where
        T: ContentGenerator + AnswerEvaluator + AnswerExtractor + 'static,
    {
        Self {
            generator: inner.clone(),
            evaluator: inner.clone(),
            extractor: inner,
        }
    }

    /// 按 [llm] 段创建：openai 走 LLM 生成与抽取，mock 使用离线生成器
    pub fn from_config(config: &AppConfig) -> Self {
        match config.llm.provider {
            LlmProvider::OpenAi => {
                let client: Arc<dyn LlmClient> = Arc::new(
                    OpenAiClient::new(
                        config.llm.base_url.as_deref(),
                        &config.llm.model,
                        config.llm.api_key.as_deref(),
                    )
                    .with_request_timeout(Duration::from_secs(config.llm.timeouts.request)),
                );
                tracing::info!(model = %config.llm.model, "Using OpenAI-compatible collaborators");
                let generator = Arc::new(LlmContentGenerator::new(client.clone()));
                Self {
                    generator: generator.clone(),
                    evaluator: generator,
                    extractor: Arc::new(LlmAnswerExtractor::new(client)),
                }
            }
            LlmProvider::Mock => {
                tracing::info!(lessons = config.workflow.offline_lessons, "Using offline collaborators");
                Self::uniform(Arc::new(OfflineContentGenerator::new(
                    config.workflow.offline_lessons,
                )))
            }
        }
    }
}

/// 工作流引擎构建器
pub struct EngineBuilder {
    collaborators: Collaborators,
    store: Option<Arc<dyn CheckpointStore>>,
    supervisor: SessionSupervisor,
    timeout: Duration,
}

impl EngineBuilder {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            store: None,
            supervisor: SessionSupervisor::new(),
            timeout: Duration::from_secs(WorkflowSection::default().collaborator_timeout_secs),
        }
    }

    /// 设置检查点存储
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 单次协作方调用的超时
    pub fn collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 与其他组件共享同一个会话占用表
    pub fn supervisor(mut self, supervisor: SessionSupervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// 读取 [workflow] 段中的超时设置
    pub fn with_config(self, config: &WorkflowSection) -> Self {
        self.collaborator_timeout(Duration::from_secs(config.collaborator_timeout_secs))
    }

    pub fn build(self) -> WorkflowEngine {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new()));
        WorkflowEngine::new(
            WorkflowGraph,
            InterruptController,
            self.collaborators,
            store,
            self.supervisor,
            self.timeout,
        )
    }
}
