//! 可观测性
//!
//! 日志默认 info，RUST_LOG 设置时完全以它为准；输出到 stderr，避免与终端交互内容混在一起。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "info";

/// 由 RUST_LOG 的值构造过滤器；未设置或无法解析时退回 info
fn env_filter(directives: Option<&str>) -> EnvFilter {
    match directives {
        Some(d) => EnvFilter::try_new(d).unwrap_or_else(|e| {
            eprintln!("ignoring invalid {}: {e}", EnvFilter::DEFAULT_ENV);
            EnvFilter::new(DEFAULT_DIRECTIVES)
        }),
        None => EnvFilter::new(DEFAULT_DIRECTIVES),
    }
}

pub fn init() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(env_filter(directives.as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
