use serde::{Deserialize, Serialize};

use crate::value_objects::{PasswordHash, Timestamp, UserId, Username};

/// 注册用户。
///
/// `is_online` / `last_seen_at` 只由会话注册表在连接建立和断开时更新。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: Username,
    #[serde(skip_serializing)] // 密码哈希不暴露给客户端
    pub password: PasswordHash,
    pub email: Option<String>,
    pub is_online: bool,
    pub last_seen_at: Option<Timestamp>,
}

impl User {
    pub fn register(
        id: UserId,
        username: Username,
        password: PasswordHash,
        email: Option<String>,
    ) -> Self {
        Self {
            id,
            username,
            password,
            email,
            is_online: false,
            last_seen_at: None,
        }
    }

    pub fn set_online(&mut self, online: bool) {
        self.is_online = online;
    }

    pub fn touch_last_seen(&mut self, now: Timestamp) {
        self.last_seen_at = Some(now);
    }
}
