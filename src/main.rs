//! Weaver HTTP 服务
//!
//! 入口：初始化日志、加载配置、装配 GenerateService 并启动 axum。
//!
//! 环境变量:
//! - STITCH_API_KEY / STITCH_PROJECT_ID: Stitch 默认凭据与复用项目
//! - DEEPSEEK_API_KEY: DeepSeek API Key
//! - WEAVER__*: 覆盖 config/default.toml 中任意键（如 WEAVER__SERVER__PORT=3000）
//!
//! 启动: cargo run

use std::sync::Arc;

use anyhow::Context;
use weaver::api::create_router;
use weaver::config::load_config;
use weaver::{observability, GenerateService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let service = GenerateService::from_config(&cfg).context("Failed to build generate service")?;

    if !service.has_default_stitch_key() && cfg.generation.backend.needs_stitch() {
        tracing::warn!("No STITCH_API_KEY configured; requests must supply config.stitch_key");
    }
    if !service.has_default_deepseek_key() && cfg.generation.backend.needs_deepseek() {
        tracing::warn!("No DEEPSEEK_API_KEY configured; requests must supply config.deepseek_key");
    }

    let app = create_router(Arc::new(service));

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(
        backend = cfg.generation.backend.as_str(),
        endpoint = %cfg.stitch.endpoint,
        "Weaver listening on http://{}",
        addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM；进行中的请求会跑完再退出
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
