use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId, Username};

/// 会话注册表维护的在线状态投影。
///
/// 这是"谁当前可达"的权威视图，与持久化的 `User.is_online`
/// 字段保持最终一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub username: Username,
    pub is_online: bool,
    pub last_seen_at: Option<Timestamp>,
}
