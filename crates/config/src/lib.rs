//! 统一配置中心
//!
//! 提供应用的全局配置管理。所有配置都有安全的默认值，
//! 可以不设任何环境变量直接在本地启动。

use serde::{Deserialize, Serialize};
use std::env;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// bcrypt cost，缺省使用库默认值
    pub bcrypt_cost: Option<u32>,
    /// 每条 WebSocket 连接的出站缓冲容量
    pub outbound_buffer: usize,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
                bcrypt_cost: env::var("BCRYPT_COST").ok().and_then(|s| s.parse().ok()),
                outbound_buffer: env::var("WS_OUTBOUND_BUFFER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(256),
            },
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
