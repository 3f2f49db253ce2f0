//! 广播器
//!
//! 面向全体在线会话的扇出。先在读锁下取句柄快照，投递全部
//! 发生在锁外，慢客户端由句柄自己的非阻塞投递兜底。

use std::sync::Arc;

use domain::{ServerFrame, UserId};
use tracing::debug;

use crate::registry::SessionRegistry;

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// 把同一帧投递给所有在线会话，返回成功投递的数量。
    pub async fn broadcast_all(&self, frame: ServerFrame) -> usize {
        let handles = self.registry.sessions_snapshot().await;
        let mut delivered = 0;
        for handle in &handles {
            if handle.deliver(frame.clone()) {
                delivered += 1;
            }
        }
        debug!(total = handles.len(), delivered, "broadcast fan-out");
        delivered
    }

    /// 定向投递。接收者不在线时是空操作，返回 false。
    pub async fn deliver_to(&self, user_id: UserId, frame: ServerFrame) -> bool {
        match self.registry.lookup(user_id).await {
            Some(handle) => handle.deliver(frame),
            None => {
                debug!(%user_id, "recipient offline, frame dropped");
                false
            }
        }
    }

    /// 向所有在线会话推送最新的用户列表快照。
    pub async fn broadcast_user_list(&self) -> usize {
        let entries = self.registry.presence_snapshot().await;
        self.broadcast_all(ServerFrame::user_list(entries)).await
    }
}
