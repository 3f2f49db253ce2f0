//! 主应用程序入口
//!
//! 启动 Axum Web API 服务。

use std::sync::Arc;

use application::{InMemoryMessageStore, MessageStore};
use config::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();

    // 单进程部署使用内存存储
    let store: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
    let state = AppState::with_store(store, config.server.bcrypt_cost)
        .outbound_buffer(config.server.outbound_buffer);

    // 启动 Web 服务器
    let app = router(state);
    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("chat server listening on http://{address}");
    axum::serve(listener, app).await?;

    Ok(())
}
