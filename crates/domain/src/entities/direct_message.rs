use serde::{Deserialize, Serialize};

use crate::value_objects::{DirectMessageId, MessageContent, Timestamp, UserId, Username};

/// 一对一私信。
///
/// `read` 是唯一可变字段，只允许 false -> true，且只能由接收方触发。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: DirectMessageId,
    pub sender_id: UserId,
    pub sender_username: Username,
    pub receiver_id: UserId,
    pub receiver_username: Username,
    pub content: MessageContent,
    pub created_at: Timestamp,
    pub read: bool,
}

impl DirectMessage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: DirectMessageId,
        sender_id: UserId,
        sender_username: Username,
        receiver_id: UserId,
        receiver_username: Username,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            sender_id,
            sender_username,
            receiver_id,
            receiver_username,
            content,
            created_at,
            read: false,
        }
    }

    /// 标记已读。幂等；read 标志只会从 false 迁移到 true。
    pub fn mark_read(&mut self) {
        self.read = true;
    }

    /// 该消息是否属于给定的一对用户（不区分方向）。
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// 该用户是否是这条消息的发送方或接收方。
    pub fn involves(&self, user_id: UserId) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}
