//! Professor - 终端学习会话
//!
//! 入口：初始化日志、加载配置、创建协作方与检查点存储，并运行交互式终端。
//! 用法：`professor [SESSION_ID] [--config PATH]`；同一个 SESSION_ID 再次运行会从上次暂停处继续。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use professor::checkpoint::create_checkpoint_store;
use professor::cli::Terminal;
use professor::config::load_config;
use professor::core::RecoveryEngine;
use professor::service::SessionService;
use professor::workflow::{Collaborators, EngineBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    professor::observability::init();

    let mut config_path = None;
    let mut session_id = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = Some(PathBuf::from(
                    args.next().context("--config requires a path")?,
                ));
            }
            _ => session_id = Some(arg),
        }
    }

    let config = load_config(config_path).context("Failed to load configuration")?;
    let store = create_checkpoint_store(&config.checkpoint)
        .context("Failed to open checkpoint store")?;

    let engine = EngineBuilder::new(Collaborators::from_config(&config))
        .checkpoint_store(store)
        .with_config(&config.workflow)
        .build();
    let service = SessionService::new(
        Arc::new(engine),
        RecoveryEngine::new(config.workflow.max_generation_retries),
    )
    .with_extraction_timeout(Duration::from_secs(config.workflow.collaborator_timeout_secs));

    let session_id = session_id
        .or_else(|| config.app.session_id.clone())
        .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));
    tracing::info!(app = %config.app.name, session = %session_id, "starting");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Terminal::new(Arc::new(service), session_id, stdin)
        .run()
        .await
        .context("Session failed")?;

    Ok(())
}
