//! Professor - 可暂停、可恢复的课程工作流引擎
//!
//! 模块划分：
//! - **agents**: 外部协作方接口（内容生成、简答评判、自由文本抽取）及 LLM / 离线实现
//! - **checkpoint**: 检查点存储（内存 / SQLite）
//! - **cli**: 交互式终端
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、恢复策略、会话监管、会话视图
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **scoring**: 测验与作业评分规则
//! - **service**: 面向传输层的会话服务
//! - **session**: 会话状态与课程内容模型
//! - **workflow**: 转移表、暂停边界、节点与执行引擎

pub mod agents;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod scoring;
pub mod service;
pub mod session;
pub mod workflow;
