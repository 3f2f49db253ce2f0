//! 聊天服务核心领域模型
//!
//! 包含用户、公共消息、私信等核心实体，经过验证的值对象，
//! 以及 WebSocket 线上协议的帧定义。

pub mod entities;
pub mod errors;
pub mod protocol;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use protocol::*;
pub use value_objects::*;
