//! Web API 层。
//!
//! 提供 Axum 路由：REST 端点负责注册 / 登录 / 历史查询，
//! `/ws` 升级为 WebSocket 后交给连接处理器驱动实时会话。

mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
