//! 会话注册表
//!
//! userId -> 活跃连接的单一事实来源。同一用户同时只允许一条
//! 连接：新连接注册时旧连接被关闭并替换。注册表同时维护
//! 进程生命周期内见过的所有用户的在线状态投影，下线的用户
//! 仍然出现在 userList 里，只是 `isOnline` 为 false。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use domain::{PresenceEntry, ServerFrame, UserId, Username};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::clock::Clock;

/// 每条连接的出站缓冲容量。缓冲满说明客户端读得太慢，
/// 该帧对这条连接直接丢弃。
pub const OUTBOUND_BUFFER: usize = 256;

/// 写任务消费的指令。
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// 向客户端投递一帧
    Deliver(ServerFrame),
    /// 要求写任务关闭底层连接
    Close,
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// 指向某条活跃连接的轻量句柄，可随意克隆。
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub user_id: UserId,
    pub username: Username,
    connection_id: u64,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(
        user_id: UserId,
        username: Username,
        sender: mpsc::Sender<SessionCommand>,
    ) -> Self {
        Self {
            user_id,
            username,
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// 非阻塞投递。缓冲满或连接已断开时丢弃该帧并返回 false，
    /// 绝不让一个慢客户端拖住扇出循环。
    pub fn deliver(&self, frame: ServerFrame) -> bool {
        match self.sender.try_send(SessionCommand::Deliver(frame)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(user_id = %self.user_id, "outbound buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(user_id = %self.user_id, "session already closed, dropping frame");
                false
            }
        }
    }

    /// 通知写任务关闭连接。连接已消失时静默成功。
    pub fn close(&self) {
        let _ = self.sender.try_send(SessionCommand::Close);
    }
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<UserId, SessionHandle>,
    presence: HashMap<UserId, PresenceEntry>,
}

/// userId -> SessionHandle 的并发映射。
pub struct SessionRegistry {
    inner: tokio::sync::RwLock<RegistryInner>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: tokio::sync::RwLock::new(RegistryInner::default()),
            clock,
        }
    }

    /// 注册一条已认证的连接。若该用户已有活跃连接，旧连接被
    /// 关闭并替换，返回 true。
    pub async fn register(&self, handle: SessionHandle) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        inner.presence.insert(
            handle.user_id,
            PresenceEntry {
                user_id: handle.user_id,
                username: handle.username.clone(),
                is_online: true,
                last_seen_at: Some(now),
            },
        );
        match inner.sessions.insert(handle.user_id, handle) {
            Some(previous) => {
                debug!(user_id = %previous.user_id, "replacing existing session");
                previous.close();
                true
            }
            None => false,
        }
    }

    /// 注销连接。只有当注册表里仍是这条连接时才移除，
    /// 被替换掉的旧连接迟到的注销是空操作。
    pub async fn unregister(&self, user_id: UserId, connection_id: u64) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        let matches = inner
            .sessions
            .get(&user_id)
            .is_some_and(|handle| handle.connection_id == connection_id);
        if !matches {
            return false;
        }
        inner.sessions.remove(&user_id);
        if let Some(entry) = inner.presence.get_mut(&user_id) {
            entry.is_online = false;
            entry.last_seen_at = Some(now);
        }
        true
    }

    pub async fn lookup(&self, user_id: UserId) -> Option<SessionHandle> {
        let inner = self.inner.read().await;
        inner.sessions.get(&user_id).cloned()
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        let inner = self.inner.read().await;
        inner.sessions.contains_key(&user_id)
    }

    /// 全部活跃连接句柄的快照。调用方在锁外完成投递。
    pub async fn sessions_snapshot(&self) -> Vec<SessionHandle> {
        let inner = self.inner.read().await;
        inner.sessions.values().cloned().collect()
    }

    /// 在线状态投影，按 userId 升序，含已下线用户。
    pub async fn presence_snapshot(&self) -> Vec<PresenceEntry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<PresenceEntry> = inner.presence.values().cloned().collect();
        entries.sort_by_key(|entry| entry.user_id);
        entries
    }
}
